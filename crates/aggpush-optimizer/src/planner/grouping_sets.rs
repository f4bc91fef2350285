use aggpush_ir::{AggregateExpr, Attribute, Expr, ExprId, LogicalPlan};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::context::ExpansionContext;
use super::null_override::{
    grouping_id_override, is_grouping_id, null_override, single_child_attribute,
};

/// An aggregate whose input is an expansion node, directly or through a projection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpandShape<'a> {
    pub project: Option<&'a [Expr]>,
    pub projections: &'a [Vec<Expr>],
    pub output: &'a [Attribute],
    pub input: &'a LogicalPlan,
}

pub(crate) fn match_expand(input: &LogicalPlan) -> Option<ExpandShape<'_>> {
    match input {
        LogicalPlan::Expand {
            input,
            projections,
            output,
        } => Some(ExpandShape {
            project: None,
            projections,
            output,
            input,
        }),
        LogicalPlan::Project {
            input: project_input,
            expressions,
        } => match project_input.as_ref() {
            LogicalPlan::Expand {
                input,
                projections,
                output,
            } => Some(ExpandShape {
                project: Some(expressions),
                projections,
                output,
                input,
            }),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GroupingSetDescriptor<'a> {
    pub group_exprs: &'a [Expr],
    /// Positionally aligned with `group_exprs`.
    pub expansion_exprs: Vec<Expr>,
    pub aggregate_exprs: &'a [Expr],
    pub expansion: Option<ExpansionContext<'a>>,
    pub aggregate_positions: FxHashMap<ExprId, usize>,
    /// Outputs the host fills with a literal instead of reading them from the store.
    pub overrides: IndexMap<ExprId, Expr>,
}

impl<'a> GroupingSetDescriptor<'a> {
    /// The single grouping set of an aggregate without an expansion node.
    pub fn plain(group_exprs: &'a [Expr], aggregate_exprs: &'a [Expr]) -> Self {
        Self {
            group_exprs,
            expansion_exprs: group_exprs.to_vec(),
            aggregate_exprs,
            expansion: None,
            aggregate_positions: FxHashMap::default(),
            overrides: IndexMap::new(),
        }
    }

    pub fn projection_row(&self) -> &'a [Expr] {
        self.expansion.map(|e| e.row).unwrap_or(&[])
    }

    /// Row value the output `id` reads, through the position map.
    pub fn row_value(&self, id: ExprId) -> Option<&'a Expr> {
        let pos = *self.aggregate_positions.get(&id)?;
        self.projection_row().get(pos)
    }

    /// Literal overrides for this row: the grouping-id marker, then every
    /// output or nested aggregate whose sole input is nulled out.
    fn literal_overrides(&self) -> IndexMap<ExprId, Expr> {
        let mut overrides = IndexMap::new();
        for expr in self.aggregate_exprs {
            let Some(id) = expr.output_id() else {
                continue;
            };
            let value = self.row_value(id);
            if let Some(literal) =
                grouping_id_override(expr, value).or_else(|| null_override(expr, value))
            {
                overrides.insert(id, literal);
                continue;
            }
            for agg in expr.collect_aggregates() {
                let agg_expr = Expr::Aggregate(agg.clone());
                if let Some(literal) = null_override(&agg_expr, self.row_value(agg.id)) {
                    overrides.insert(agg.id, literal);
                }
            }
        }
        overrides
    }

    /// Group expressions that become dimensions of this set, with their
    /// aligned expansion expressions.
    pub fn dimension_candidates(&self) -> Vec<(&'a Expr, &Expr)> {
        self.group_exprs
            .iter()
            .zip(&self.expansion_exprs)
            .filter(|(group, expanded)| {
                let marker = matches!(group.strip_alias(), Expr::Column(attr) if is_grouping_id(attr));
                !marker && !expanded.is_null_literal()
            })
            .collect()
    }

    fn is_group_reference(&self, expr: &Expr) -> bool {
        match expr.strip_alias() {
            Expr::Column(attr) => self
                .group_exprs
                .iter()
                .any(|g| g.output_id() == Some(attr.id)),
            inner => self.group_exprs.iter().any(|g| g.strip_alias() == inner),
        }
    }

    /// Aggregates that must be pushed for this set, one per identity.
    pub fn aggregate_candidates(&self) -> Vec<&'a AggregateExpr> {
        let mut out: Vec<&'a AggregateExpr> = Vec::new();
        for expr in self.aggregate_exprs {
            if expr
                .output_id()
                .is_some_and(|id| self.overrides.contains_key(&id))
                || self.is_group_reference(expr)
            {
                continue;
            }
            for agg in expr.collect_aggregates() {
                if !self.overrides.contains_key(&agg.id) && !out.iter().any(|a| a.id == agg.id) {
                    out.push(agg);
                }
            }
        }
        out
    }
}

/// One descriptor per expansion row.
pub(crate) fn decompose<'a>(
    shape: &ExpandShape<'a>,
    group_exprs: &'a [Expr],
    aggregate_exprs: &'a [Expr],
) -> Vec<GroupingSetDescriptor<'a>> {
    shape
        .projections
        .iter()
        .map(|row| {
            let expansion = ExpansionContext {
                project: shape.project,
                output: shape.output,
                row,
            };
            describe(expansion, group_exprs, aggregate_exprs)
        })
        .collect()
}

fn describe<'a>(
    expansion: ExpansionContext<'a>,
    group_exprs: &'a [Expr],
    aggregate_exprs: &'a [Expr],
) -> GroupingSetDescriptor<'a> {
    let expansion_exprs = group_exprs.iter().map(|g| expansion.resolve(g)).collect();

    let mut aggregate_positions = FxHashMap::default();
    let mut record = |id: ExprId, expr: &Expr| {
        if let Some(pos) = single_child_attribute(expr).and_then(|a| expansion.position(a)) {
            aggregate_positions.insert(id, pos);
        }
    };
    for expr in aggregate_exprs {
        let Some(id) = expr.output_id() else {
            continue;
        };
        record(id, expr);
        for agg in expr.collect_aggregates() {
            record(agg.id, &Expr::Aggregate(agg.clone()));
        }
    }

    let mut set = GroupingSetDescriptor {
        group_exprs,
        expansion_exprs,
        aggregate_exprs,
        expansion: Some(expansion),
        aggregate_positions,
        overrides: IndexMap::new(),
    };
    set.overrides = set.literal_overrides();
    set
}
