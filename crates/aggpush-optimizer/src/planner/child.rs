use aggpush_ir::{Attribute, Expr, ExprId, LogicalPlan};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::query_builder::QueryBuilder;
use crate::store::StoreCatalog;

/// The store query built for an aggregate's input, plus whatever the host
/// would still have to compute over it.
#[derive(Debug, Clone, PartialEq)]
pub struct PushedChild {
    pub builder: QueryBuilder,
    pub residual: Vec<Expr>,
    /// Store column read by each attribute a projection introduced.
    pub store_columns: FxHashMap<ExprId, String>,
}

impl PushedChild {
    pub fn new(builder: QueryBuilder) -> Self {
        Self {
            builder,
            residual: Vec::new(),
            store_columns: FxHashMap::default(),
        }
    }

    pub fn is_fully_pushed(&self) -> bool {
        self.residual.is_empty()
    }

    /// Name of the store column `attr` reads. Scan attributes carry it already.
    pub fn store_name<'b>(&'b self, attr: &'b Attribute) -> &'b str {
        self.store_columns
            .get(&attr.id)
            .map_or(attr.name.as_str(), String::as_str)
    }
}

/// Pushes the subtree under an aggregate.
pub trait ChildPushdown {
    fn push(&self, plan: &LogicalPlan) -> Option<PushedChild>;
}

/// Pushes scans of catalog relations and column-only projections over them.
pub struct ScanPushdown<'a> {
    catalog: &'a dyn StoreCatalog,
}

impl<'a> ScanPushdown<'a> {
    pub fn new(catalog: &'a dyn StoreCatalog) -> Self {
        Self { catalog }
    }
}

impl ChildPushdown for ScanPushdown<'_> {
    fn push(&self, plan: &LogicalPlan) -> Option<PushedChild> {
        match plan {
            LogicalPlan::Scan { table_name, .. } => match self.catalog.relation(table_name) {
                Ok(relation) => Some(PushedChild::new(QueryBuilder::new(relation))),
                Err(e) => {
                    debug!(error = %e, "Scan not backed by the store");
                    None
                }
            },
            LogicalPlan::Project { input, expressions } => {
                let mut child = self.push(input)?;
                for expr in expressions {
                    match (expr.strip_alias(), expr.output_id()) {
                        (Expr::Column(source), Some(id)) => {
                            let name = child.store_name(source).to_string();
                            child.store_columns.insert(id, name);
                        }
                        _ => child.residual.push(expr.clone()),
                    }
                }
                Some(child)
            }
            LogicalPlan::Filter { input, predicate } => {
                let mut child = self.push(input)?;
                child.residual.push(predicate.clone());
                Some(child)
            }
            LogicalPlan::Expand { .. } | LogicalPlan::Aggregate { .. } => None,
        }
    }
}
