//! Host logical plan IR consumed by the aggregate pushdown compiler.

mod expr;
mod plan;

pub use expr::{
    AggregateExpr, AggregateFunction, AggregateMode, Attribute, BinaryOp, Expr, ExprId,
    ScalarFunction,
};
pub use plan::LogicalPlan;
