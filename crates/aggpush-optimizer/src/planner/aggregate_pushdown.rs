use aggpush_ir::LogicalPlan;
use tracing::{debug, instrument};

use super::aggregate::translate_aggregate;
use super::child::{ChildPushdown, PushedChild};
use super::context::TranslationContext;
use super::group_by::translate_group_expr;
use super::grouping_sets::{GroupingSetDescriptor, decompose, match_expand};
use crate::PushdownSettings;
use crate::pushdown_plan::{PushdownPlan, PushedAggregate, PushedGroupingSet};
use crate::query_builder::translate_all;
use crate::script::ScriptCompiler;

/// Replaces aggregate nodes, including grouping-set shapes, with store
/// queries. A node is pushed as a whole or not at all.
pub struct AggregatePushdown<'a> {
    child: &'a dyn ChildPushdown,
    scripts: &'a dyn ScriptCompiler,
    settings: &'a PushdownSettings,
}

impl<'a> AggregatePushdown<'a> {
    pub fn new(
        child: &'a dyn ChildPushdown,
        scripts: &'a dyn ScriptCompiler,
        settings: &'a PushdownSettings,
    ) -> Self {
        Self {
            child,
            scripts,
            settings,
        }
    }

    #[instrument(skip_all, fields(node = plan.node_name()))]
    pub fn push(&self, plan: &LogicalPlan) -> Option<PushedAggregate> {
        let LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
        } = plan
        else {
            return None;
        };

        let shape = match_expand(input);
        if shape.is_some() && !self.settings.push_grouping_sets {
            debug!("Grouping sets pushdown disabled, leaving aggregate to the host");
            return None;
        }

        let child_plan = shape.as_ref().map_or(input.as_ref(), |s| s.input);
        let Some(child) = self.child.push(child_plan) else {
            debug!(child = child_plan.node_name(), "Aggregate input not pushable");
            return None;
        };
        if !child.is_fully_pushed() {
            debug!(
                residual = child.residual.len(),
                "Aggregate input only partially pushed"
            );
            return None;
        }

        let descriptors = match &shape {
            Some(shape) => decompose(shape, group_by, aggregates),
            None => vec![GroupingSetDescriptor::plain(group_by, aggregates)],
        };

        let grouping_sets = descriptors
            .iter()
            .enumerate()
            .map(|(index, set)| {
                let pushed = self.translate_set(&child, set);
                if pushed.is_none() {
                    debug!(set = index, "Grouping set not translatable, rejecting aggregate");
                }
                pushed
            })
            .collect::<Option<Vec<_>>>()?;

        debug!(
            sets = grouping_sets.len(),
            relation = %child.builder.relation().name,
            "Aggregate pushed"
        );
        Some(PushedAggregate {
            grouping_sets,
            group_by: group_by.clone(),
            aggregates: aggregates.clone(),
        })
    }

    /// Each set starts its own builder lineage from the child's builder.
    fn translate_set(
        &self,
        child: &PushedChild,
        set: &GroupingSetDescriptor<'_>,
    ) -> Option<PushedGroupingSet> {
        let ctx = TranslationContext {
            settings: self.settings,
            scripts: self.scripts,
            expansion: set.expansion,
            overrides: &set.overrides,
            store_columns: &child.store_columns,
        };
        let builder = translate_all(
            child.builder.clone(),
            set.dimension_candidates(),
            |builder, (group, expanded)| translate_group_expr(&ctx, builder, group, expanded),
        )?;
        let builder = translate_all(builder, set.aggregate_candidates(), |builder, agg| {
            translate_aggregate(&ctx, builder, agg)
        })?;
        Some(PushedGroupingSet {
            query: builder,
            overrides: set.overrides.clone(),
        })
    }

    pub fn apply(&self, plan: LogicalPlan) -> PushdownPlan {
        apply_aggregate_pushdown(plan, self)
    }
}

/// Pushes every pushable aggregate in `plan`, outermost first.
pub fn apply_aggregate_pushdown(plan: LogicalPlan, rule: &AggregatePushdown<'_>) -> PushdownPlan {
    if let Some(pushed) = rule.push(&plan) {
        return PushdownPlan::StoreAggregate(pushed);
    }
    match plan {
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
        } => PushdownPlan::Aggregate {
            input: Box::new(apply_aggregate_pushdown(*input, rule)),
            group_by,
            aggregates,
        },
        LogicalPlan::Project { input, expressions } => PushdownPlan::Project {
            input: Box::new(apply_aggregate_pushdown(*input, rule)),
            expressions,
        },
        LogicalPlan::Filter { input, predicate } => PushdownPlan::Filter {
            input: Box::new(apply_aggregate_pushdown(*input, rule)),
            predicate,
        },
        LogicalPlan::Expand {
            input,
            projections,
            output,
        } => PushdownPlan::Expand {
            input: Box::new(apply_aggregate_pushdown(*input, rule)),
            projections,
            output,
        },
        scan @ LogicalPlan::Scan { .. } => PushdownPlan::from_logical(scan),
    }
}
