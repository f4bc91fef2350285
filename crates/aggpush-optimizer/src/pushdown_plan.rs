use aggpush_common::types::DataType;
use aggpush_ir::{Attribute, Expr, ExprId, LogicalPlan};
use indexmap::IndexMap;
use serde::Serialize;

use crate::query_builder::{OutputAttribute, QueryBuilder, StoreType};

/// How the host obtains one output column of a pushed grouping set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutputBinding {
    /// Not read from the store; the host substitutes this literal.
    Literal { value: Expr },
    #[serde(rename_all = "camelCase")]
    Column {
        name: String,
        store_type: StoreType,
        host_type: DataType,
    },
    /// Computed by the host over other pushed columns.
    Unbound,
}

impl From<&OutputAttribute> for OutputBinding {
    fn from(attr: &OutputAttribute) -> Self {
        OutputBinding::Column {
            name: attr.name.clone(),
            store_type: attr.store_type,
            host_type: attr.host_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushedGroupingSet {
    pub query: QueryBuilder,
    /// Outputs the host fills with a literal for this set, keyed by identity.
    pub overrides: IndexMap<ExprId, Expr>,
}

impl PushedGroupingSet {
    pub fn binding(&self, output: &Expr) -> OutputBinding {
        if let Some(literal) = output.output_id().and_then(|id| self.overrides.get(&id)) {
            return OutputBinding::Literal {
                value: literal.clone(),
            };
        }
        let inner = output.strip_alias();
        let bound = match inner {
            Expr::Aggregate(agg) => self.query.output_for(agg.id),
            Expr::Column(attr) => self.query.output_for(attr.id),
            _ => None,
        }
        .or_else(|| {
            output
                .output_id()
                .and_then(|id| self.query.output_for(id))
        })
        .or_else(|| {
            self.query
                .output_attributes()
                .find(|attr| attr.expr.strip_alias() == inner)
        });
        bound.map_or(OutputBinding::Unbound, OutputBinding::from)
    }

    pub fn bindings(&self, outputs: &[Expr]) -> Vec<OutputBinding> {
        outputs.iter().map(|o| self.binding(o)).collect()
    }
}

/// An aggregate node answered entirely by the store, one query per grouping set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushedAggregate {
    pub grouping_sets: Vec<PushedGroupingSet>,
    pub group_by: Vec<Expr>,
    pub aggregates: Vec<Expr>,
}

impl PushedAggregate {
    pub fn output(&self) -> Vec<Attribute> {
        self.aggregates
            .iter()
            .filter_map(|e| match e {
                Expr::Aggregate(agg) => Some(Attribute::new(agg.id, agg.func.name(), agg.data_type)),
                other => other.to_attribute(),
            })
            .collect()
    }

    /// Per grouping set, the bindings of every output column.
    pub fn bindings(&self) -> Vec<Vec<OutputBinding>> {
        self.grouping_sets
            .iter()
            .map(|set| set.bindings(&self.aggregates))
            .collect()
    }
}

/// A host plan with the pushed aggregates replaced by store queries.
#[derive(Debug, Clone, PartialEq)]
pub enum PushdownPlan {
    Scan {
        table_name: String,
        output: Vec<Attribute>,
    },

    Filter {
        input: Box<PushdownPlan>,
        predicate: Expr,
    },

    Project {
        input: Box<PushdownPlan>,
        expressions: Vec<Expr>,
    },

    Expand {
        input: Box<PushdownPlan>,
        projections: Vec<Vec<Expr>>,
        output: Vec<Attribute>,
    },

    Aggregate {
        input: Box<PushdownPlan>,
        group_by: Vec<Expr>,
        aggregates: Vec<Expr>,
    },

    StoreAggregate(PushedAggregate),
}

impl PushdownPlan {
    /// The same tree with nothing pushed.
    pub fn from_logical(plan: LogicalPlan) -> Self {
        match plan {
            LogicalPlan::Scan { table_name, output } => PushdownPlan::Scan { table_name, output },
            LogicalPlan::Filter { input, predicate } => PushdownPlan::Filter {
                input: Box::new(Self::from_logical(*input)),
                predicate,
            },
            LogicalPlan::Project { input, expressions } => PushdownPlan::Project {
                input: Box::new(Self::from_logical(*input)),
                expressions,
            },
            LogicalPlan::Expand {
                input,
                projections,
                output,
            } => PushdownPlan::Expand {
                input: Box::new(Self::from_logical(*input)),
                projections,
                output,
            },
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => PushdownPlan::Aggregate {
                input: Box::new(Self::from_logical(*input)),
                group_by,
                aggregates,
            },
        }
    }

    pub fn output(&self) -> Vec<Attribute> {
        match self {
            PushdownPlan::Scan { output, .. } | PushdownPlan::Expand { output, .. } => output.clone(),
            PushdownPlan::Filter { input, .. } => input.output(),
            PushdownPlan::Project { expressions, .. } => {
                expressions.iter().filter_map(Expr::to_attribute).collect()
            }
            PushdownPlan::Aggregate { aggregates, .. } => aggregates
                .iter()
                .filter_map(|e| match e {
                    Expr::Aggregate(agg) => {
                        Some(Attribute::new(agg.id, agg.func.name(), agg.data_type))
                    }
                    other => other.to_attribute(),
                })
                .collect(),
            PushdownPlan::StoreAggregate(pushed) => pushed.output(),
        }
    }

    pub fn input(&self) -> Option<&PushdownPlan> {
        match self {
            PushdownPlan::Scan { .. } | PushdownPlan::StoreAggregate(_) => None,
            PushdownPlan::Filter { input, .. }
            | PushdownPlan::Project { input, .. }
            | PushdownPlan::Expand { input, .. }
            | PushdownPlan::Aggregate { input, .. } => Some(input),
        }
    }

    pub fn is_pushed(&self) -> bool {
        matches!(self, PushdownPlan::StoreAggregate(_))
    }

    /// Every store aggregate in the tree, outermost first.
    pub fn pushed_aggregates(&self) -> Vec<&PushedAggregate> {
        let mut out = Vec::new();
        let mut node = Some(self);
        while let Some(plan) = node {
            if let PushdownPlan::StoreAggregate(pushed) = plan {
                out.push(pushed);
            }
            node = plan.input();
        }
        out
    }
}
