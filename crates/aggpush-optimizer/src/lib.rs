//! Aggregate pushdown compiler.
//!
//! Rewrites grouped aggregates of a host logical plan (including GROUPING
//! SETS / CUBE / ROLLUP shapes built on an expansion node) into native
//! aggregation queries for a column-oriented analytical store. A node is
//! either pushed completely or left for the host untouched.

mod planner;
mod pushdown_plan;
pub mod query_builder;
pub mod script;
pub mod store;
#[cfg(test)]
mod test_utils;

use aggpush_common::error::{Error, Result};
use aggpush_ir::LogicalPlan;
pub use planner::{
    AggregatePushdown, ChildPushdown, PushedChild, ScanPushdown, apply_aggregate_pushdown,
};
pub use pushdown_plan::{OutputBinding, PushdownPlan, PushedAggregate, PushedGroupingSet};
pub use query_builder::{
    AggregationSpec, ArithmeticOp, DimensionSpec, ExtractionFn, NativeFunction, OutputAttribute,
    PostAggregation, QueryBuilder, StoreType,
};
pub use script::{GeneratedFunction, NoScripts, ScriptCompiler, ScriptContext};
use serde::Deserialize;
pub use store::{ColumnDescriptor, ColumnKind, InMemoryCatalog, StoreCatalog, StoreRelation};

pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PushdownSettings {
    /// Push aggregates over an expansion node, one native query per grouping set.
    pub push_grouping_sets: bool,
    /// Allow the scripting collaborator as a last resort for dimensions and aggregates.
    pub script_fallback: bool,
    /// Timezone for time extraction when the expression does not carry one.
    pub timezone: String,
}

impl Default for PushdownSettings {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl PushdownSettings {
    pub fn all_enabled() -> Self {
        Self {
            push_grouping_sets: true,
            script_fallback: true,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    pub fn all_disabled() -> Self {
        Self {
            push_grouping_sets: false,
            script_fallback: false,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        let settings: PushdownSettings =
            toml::from_str(source).map_err(|e| Error::invalid_config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map(|_| ())
            .map_err(|_| Error::invalid_config(format!("unknown timezone '{}'", self.timezone)))
    }
}

pub fn optimize(
    plan: &LogicalPlan,
    catalog: &dyn StoreCatalog,
    scripts: &dyn ScriptCompiler,
) -> Result<PushdownPlan> {
    optimize_with_settings(plan, catalog, scripts, &PushdownSettings::all_enabled())
}

pub fn optimize_with_settings(
    plan: &LogicalPlan,
    catalog: &dyn StoreCatalog,
    scripts: &dyn ScriptCompiler,
    settings: &PushdownSettings,
) -> Result<PushdownPlan> {
    settings.validate()?;
    let child = ScanPushdown::new(catalog);
    let rule = AggregatePushdown::new(&child, scripts, settings);
    Ok(rule.apply(plan.clone()))
}

/// Pushes a single aggregate node, or returns `None` if any part of it cannot be pushed.
pub fn push_aggregate(
    plan: &LogicalPlan,
    catalog: &dyn StoreCatalog,
    scripts: &dyn ScriptCompiler,
    settings: &PushdownSettings,
) -> Option<PushedAggregate> {
    let child = ScanPushdown::new(catalog);
    AggregatePushdown::new(&child, scripts, settings).push(plan)
}
