use std::sync::Arc;

use aggpush_common::error::{Error, Result};
use aggpush_common::types::DataType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Dimension,
    Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub data_type: DataType,
    /// Pre-built approximate-cardinality sketch over this column.
    #[serde(default)]
    pub sketch_metric: Option<String>,
    /// Set on the metric that already materializes the row count.
    #[serde(default)]
    pub is_count_metric: bool,
}

impl ColumnDescriptor {
    pub fn dimension(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Dimension,
            data_type,
            sketch_metric: None,
            is_count_metric: false,
        }
    }

    pub fn metric(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Metric,
            data_type,
            sketch_metric: None,
            is_count_metric: false,
        }
    }

    pub fn count_metric(name: impl Into<String>) -> Self {
        Self {
            is_count_metric: true,
            ..Self::metric(name, DataType::Int64)
        }
    }

    pub fn with_sketch_metric(mut self, sketch: impl Into<String>) -> Self {
        self.sketch_metric = Some(sketch.into());
        self
    }

    pub fn is_dimension(&self) -> bool {
        self.kind == ColumnKind::Dimension
    }

    pub fn is_metric(&self) -> bool {
        self.kind == ColumnKind::Metric
    }
}

/// A datasource exposed by the analytical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRelation {
    pub name: String,
    pub time_column: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Prefer pre-built sketches over computing cardinality from the dimension.
    #[serde(default)]
    pub prefer_sketch_metrics: bool,
}

impl StoreRelation {
    pub fn new(name: impl Into<String>, time_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_column: time_column.into(),
            columns: Vec::new(),
            prefer_sketch_metrics: false,
        }
    }

    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_prefer_sketch_metrics(mut self, prefer: bool) -> Self {
        self.prefer_sketch_metrics = prefer;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_time_column(&self, name: &str) -> bool {
        self.time_column.eq_ignore_ascii_case(name)
    }

    pub fn non_time_dimension(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.column(name)
            .filter(|c| c.is_dimension() && !self.is_time_column(&c.name))
    }

    pub fn metric(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.column(name).filter(|c| c.is_metric())
    }

    pub fn count_metric(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_metric() && c.is_count_metric)
    }
}

pub trait StoreCatalog {
    fn get_relation(&self, name: &str) -> Option<Arc<StoreRelation>>;

    fn relation(&self, name: &str) -> Result<Arc<StoreRelation>> {
        self.get_relation(name)
            .ok_or_else(|| Error::relation_not_found(name))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    relations: FxHashMap<String, Arc<StoreRelation>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relation(mut self, relation: StoreRelation) -> Self {
        self.register(relation);
        self
    }

    pub fn register(&mut self, relation: StoreRelation) {
        self.relations
            .insert(relation.name.to_lowercase(), Arc::new(relation));
    }
}

impl StoreCatalog for InMemoryCatalog {
    fn get_relation(&self, name: &str) -> Option<Arc<StoreRelation>> {
        self.relations.get(&name.to_lowercase()).cloned()
    }
}
