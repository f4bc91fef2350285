//! aggpush - aggregate and grouping-set pushdown for analytical stores.
//!
//! aggpush rewrites grouped aggregates of a host logical plan into native
//! aggregation queries for a remote column-oriented store, so the store does
//! the grouping and the host only reads the results back.
//!
//! # Architecture
//!
//! ```text
//! LogicalPlan → ChildPushdown → GroupingSet decomposition → Dimension/Aggregation translation → PushdownPlan
//! ```
//!
//! GROUPING SETS, CUBE and ROLLUP arrive as an aggregate over an expansion
//! node. Each grouping set becomes one native query; if any of them cannot be
//! translated the aggregate is left to the host as a whole.
//!
//! # Example
//!
//! ```rust,ignore
//! use aggpush::{InMemoryCatalog, NoScripts, optimize};
//!
//! let catalog = InMemoryCatalog::new().with_relation(sales_relation());
//! let pushed = optimize(&plan, &catalog, &NoScripts)?;
//! for aggregate in pushed.pushed_aggregates() {
//!     for set in &aggregate.grouping_sets {
//!         println!("{}", serde_json::to_string(&set.query)?);
//!     }
//! }
//! ```

pub use aggpush_common::error::{Error, Result};
pub use aggpush_common::types::{DataType, Value};
pub use aggpush_ir::{
    AggregateExpr, AggregateFunction, AggregateMode, Attribute, BinaryOp, Expr, ExprId,
    LogicalPlan, ScalarFunction,
};
pub use aggpush_optimizer::{
    AggregatePushdown, AggregationSpec, ArithmeticOp, ChildPushdown, ColumnDescriptor, ColumnKind,
    DEFAULT_TIMEZONE, DimensionSpec, ExtractionFn, GeneratedFunction, InMemoryCatalog,
    NativeFunction, NoScripts, OutputAttribute, OutputBinding, PostAggregation, PushdownPlan,
    PushdownSettings, PushedAggregate, PushedChild, PushedGroupingSet, QueryBuilder,
    ScanPushdown, ScriptCompiler, ScriptContext, StoreCatalog, StoreRelation, StoreType,
    apply_aggregate_pushdown, optimize, optimize_with_settings, push_aggregate,
};
