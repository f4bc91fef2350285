use serde::{Deserialize, Serialize};

use crate::expr::{Attribute, Expr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    Scan {
        table_name: String,
        output: Vec<Attribute>,
    },

    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },

    Project {
        input: Box<LogicalPlan>,
        expressions: Vec<Expr>,
    },

    /// One output row per projection row per input row; columns outside a
    /// grouping set are nulled out in that set's row.
    Expand {
        input: Box<LogicalPlan>,
        projections: Vec<Vec<Expr>>,
        output: Vec<Attribute>,
    },

    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<Expr>,
        aggregates: Vec<Expr>,
    },
}

impl LogicalPlan {
    pub fn output(&self) -> Vec<Attribute> {
        match self {
            LogicalPlan::Scan { output, .. } | LogicalPlan::Expand { output, .. } => output.clone(),
            LogicalPlan::Filter { input, .. } => input.output(),
            LogicalPlan::Project { expressions, .. } => expressions
                .iter()
                .filter_map(Expr::to_attribute)
                .collect(),
            LogicalPlan::Aggregate { aggregates, .. } => aggregates
                .iter()
                .filter_map(|e| match e {
                    Expr::Aggregate(agg) => Some(Attribute::new(
                        agg.id,
                        agg.func.name(),
                        agg.data_type,
                    )),
                    other => other.to_attribute(),
                })
                .collect(),
        }
    }

    pub fn input(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } => None,
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Expand { input, .. }
            | LogicalPlan::Aggregate { input, .. } => Some(input),
        }
    }

    pub fn node_name(&self) -> &'static str {
        match self {
            LogicalPlan::Scan { .. } => "Scan",
            LogicalPlan::Filter { .. } => "Filter",
            LogicalPlan::Project { .. } => "Project",
            LogicalPlan::Expand { .. } => "Expand",
            LogicalPlan::Aggregate { .. } => "Aggregate",
        }
    }
}
