use std::sync::Arc;

use aggpush_common::types::DataType;
use aggpush_ir::{Expr, ExprId};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Value as JsonValue, json};

use crate::script::GeneratedFunction;
use crate::store::StoreRelation;

const ALIAS_PREFIX: &str = "alias-";

/// Type of a column as the store declares it in its result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Long,
    Double,
    String,
    Timestamp,
}

impl StoreType {
    pub fn of(data_type: DataType) -> Self {
        match data_type {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                StoreType::Long
            }
            DataType::Float32 | DataType::Float64 => StoreType::Double,
            DataType::Date | DataType::Timestamp => StoreType::Timestamp,
            DataType::Null | DataType::Bool | DataType::String => StoreType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ExtractionFn {
    #[serde(rename = "timeFormat")]
    TimeFormat {
        format: String,
        #[serde(rename = "timeZone")]
        timezone: String,
    },
    #[serde(rename = "time")]
    TimeParse {
        #[serde(rename = "timeFormat")]
        input_format: String,
        #[serde(rename = "resultFormat")]
        output_format: String,
        #[serde(rename = "timeZone")]
        timezone: String,
    },
    #[serde(rename = "javascript")]
    Script { function: GeneratedFunction },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DimensionSpec {
    #[serde(rename = "default", rename_all = "camelCase")]
    Default {
        dimension: String,
        output_name: String,
    },
    #[serde(rename = "extraction", rename_all = "camelCase")]
    Extraction {
        dimension: String,
        output_name: String,
        extraction_fn: ExtractionFn,
    },
}

impl DimensionSpec {
    pub fn output_name(&self) -> &str {
        match self {
            DimensionSpec::Default { output_name, .. }
            | DimensionSpec::Extraction { output_name, .. } => output_name,
        }
    }

    pub fn dimension(&self) -> &str {
        match self {
            DimensionSpec::Default { dimension, .. }
            | DimensionSpec::Extraction { dimension, .. } => dimension,
        }
    }
}

/// Native aggregator function ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFunction {
    LongSum,
    DoubleSum,
    LongMin,
    DoubleMin,
    LongMax,
    DoubleMax,
    Count,
}

impl NativeFunction {
    pub fn id(&self) -> &'static str {
        match self {
            NativeFunction::LongSum => "longSum",
            NativeFunction::DoubleSum => "doubleSum",
            NativeFunction::LongMin => "longMin",
            NativeFunction::DoubleMin => "doubleMin",
            NativeFunction::LongMax => "longMax",
            NativeFunction::DoubleMax => "doubleMax",
            NativeFunction::Count => "count",
        }
    }

    pub fn store_type(&self) -> StoreType {
        match self {
            NativeFunction::LongSum
            | NativeFunction::LongMin
            | NativeFunction::LongMax
            | NativeFunction::Count => StoreType::Long,
            NativeFunction::DoubleSum | NativeFunction::DoubleMin | NativeFunction::DoubleMax => {
                StoreType::Double
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationSpec {
    Function {
        function: NativeFunction,
        name: String,
        field_name: Option<String>,
    },
    Cardinality {
        name: String,
        fields: Vec<String>,
    },
    HyperUnique {
        name: String,
        field_name: String,
    },
    Script {
        name: String,
        function: GeneratedFunction,
    },
}

impl AggregationSpec {
    pub fn name(&self) -> &str {
        match self {
            AggregationSpec::Function { name, .. }
            | AggregationSpec::Cardinality { name, .. }
            | AggregationSpec::HyperUnique { name, .. }
            | AggregationSpec::Script { name, .. } => name,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            AggregationSpec::Function {
                function,
                name,
                field_name: Some(field),
            } => json!({ "type": function.id(), "name": name, "fieldName": field }),
            AggregationSpec::Function {
                function,
                name,
                field_name: None,
            } => json!({ "type": function.id(), "name": name }),
            AggregationSpec::Cardinality { name, fields } => {
                json!({ "type": "cardinality", "name": name, "fields": fields, "byRow": false })
            }
            AggregationSpec::HyperUnique { name, field_name } => {
                json!({ "type": "hyperUnique", "name": name, "fieldName": field_name })
            }
            AggregationSpec::Script { name, function } => json!({
                "type": "javascript",
                "name": name,
                "fieldNames": function.params,
                "function": function.body,
            }),
        }
    }
}

impl Serialize for AggregationSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// Arithmetic over already aggregated fields, referenced by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostAggregation {
    pub name: String,
    pub op: ArithmeticOp,
    pub fields: Vec<String>,
}

impl PostAggregation {
    pub fn division(name: impl Into<String>, numerator: &str, denominator: &str) -> Self {
        Self {
            name: name.into(),
            op: ArithmeticOp::Div,
            fields: vec![numerator.to_string(), denominator.to_string()],
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let fields: Vec<JsonValue> = self
            .fields
            .iter()
            .map(|f| json!({ "type": "fieldAccess", "fieldName": f }))
            .collect();
        json!({
            "type": "arithmetic",
            "name": self.name,
            "fn": self.op.symbol(),
            "fields": fields,
        })
    }
}

impl Serialize for PostAggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// How one result column maps back to the host plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAttribute {
    pub name: String,
    pub expr: Expr,
    pub store_type: StoreType,
    pub host_type: DataType,
}

impl OutputAttribute {
    pub fn new(name: impl Into<String>, expr: Expr, store_type: StoreType, host_type: DataType) -> Self {
        Self {
            name: name.into(),
            expr,
            store_type,
            host_type,
        }
    }
}

/// Accumulated native query for one grouping set.
///
/// A persistent value: every `with_*` method returns an extended copy and
/// leaves `self` untouched, so sibling translation attempts that start from
/// the same builder never observe each other. Generated aliases are unique
/// within one lineage only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBuilder {
    #[serde(skip)]
    relation: Arc<StoreRelation>,
    dimensions: Vec<DimensionSpec>,
    aggregations: Vec<AggregationSpec>,
    post_aggregations: Vec<PostAggregation>,
    output_attributes: IndexMap<String, OutputAttribute>,
    #[serde(skip)]
    alias_counter: u32,
}

impl QueryBuilder {
    pub fn new(relation: Arc<StoreRelation>) -> Self {
        Self {
            relation,
            dimensions: Vec::new(),
            aggregations: Vec::new(),
            post_aggregations: Vec::new(),
            output_attributes: IndexMap::new(),
            alias_counter: 0,
        }
    }

    pub fn relation(&self) -> &Arc<StoreRelation> {
        &self.relation
    }

    pub fn dimensions(&self) -> &[DimensionSpec] {
        &self.dimensions
    }

    pub fn aggregations(&self) -> &[AggregationSpec] {
        &self.aggregations
    }

    pub fn post_aggregations(&self) -> &[PostAggregation] {
        &self.post_aggregations
    }

    pub fn output_attributes(&self) -> impl Iterator<Item = &OutputAttribute> {
        self.output_attributes.values()
    }

    pub fn output_attribute(&self, name: &str) -> Option<&OutputAttribute> {
        self.output_attributes.get(name)
    }

    /// The result column bound to the named host expression with this identity.
    pub fn output_for(&self, id: ExprId) -> Option<&OutputAttribute> {
        self.output_attributes
            .values()
            .find(|attr| attr.expr.output_id() == Some(id))
    }

    pub fn aggregation(&self, name: &str) -> Option<&AggregationSpec> {
        self.aggregations.iter().find(|a| a.name() == name)
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.output_attributes.contains_key(name)
            || self.dimensions.iter().any(|d| d.output_name() == name)
            || self.aggregations.iter().any(|a| a.name() == name)
            || self.post_aggregations.iter().any(|p| p.name == name)
    }

    /// Every result column name this builder has produced.
    pub fn result_names(&self) -> Vec<&str> {
        self.dimensions
            .iter()
            .map(DimensionSpec::output_name)
            .chain(self.aggregations.iter().map(AggregationSpec::name))
            .chain(self.post_aggregations.iter().map(|p| p.name.as_str()))
            .collect()
    }

    pub fn next_alias(&self) -> (String, QueryBuilder) {
        let mut counter = self.alias_counter;
        let name = loop {
            let candidate = format!("{}{}", ALIAS_PREFIX, counter);
            counter += 1;
            if !self.is_name_taken(&candidate) {
                break candidate;
            }
        };
        let next = QueryBuilder {
            alias_counter: counter,
            ..self.clone()
        };
        (name, next)
    }

    /// `preferred` when it is still free, a generated alias otherwise.
    pub fn output_name(&self, preferred: Option<&str>) -> (String, QueryBuilder) {
        match preferred {
            Some(name) if !self.is_name_taken(name) => (name.to_string(), self.clone()),
            _ => self.next_alias(),
        }
    }

    pub fn with_dimension(&self, spec: DimensionSpec) -> QueryBuilder {
        let mut next = self.clone();
        next.dimensions.push(spec);
        next
    }

    pub fn with_aggregation(&self, spec: AggregationSpec) -> QueryBuilder {
        let mut next = self.clone();
        next.aggregations.push(spec);
        next
    }

    pub fn with_post_aggregation(&self, spec: PostAggregation) -> QueryBuilder {
        let mut next = self.clone();
        next.post_aggregations.push(spec);
        next
    }

    pub fn with_output_attribute(&self, attr: OutputAttribute) -> QueryBuilder {
        let mut next = self.clone();
        next.output_attributes.insert(attr.name.clone(), attr);
        next
    }
}

/// Threads `builder` through `f` for every item; the first `None` discards
/// everything accumulated so far.
pub(crate) fn translate_all<T, I, F>(builder: QueryBuilder, items: I, mut f: F) -> Option<QueryBuilder>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&QueryBuilder, T) -> Option<QueryBuilder>,
{
    items.into_iter().try_fold(builder, |acc, item| f(&acc, item))
}
