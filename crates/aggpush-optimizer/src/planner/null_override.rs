use aggpush_ir::{Attribute, Expr};
use tracing::trace;

/// Marker column the host planner adds to an expansion node to number grouping sets.
pub(crate) const GROUPING_ID_MARKER: &str = "spark_grouping_id";
/// Some dialects name the same marker `gid`.
pub(crate) const GROUPING_ID_NAME: &str = "gid";

pub(crate) fn is_grouping_id(attr: &Attribute) -> bool {
    attr.name.eq_ignore_ascii_case(GROUPING_ID_MARKER)
        || attr.name.eq_ignore_ascii_case(GROUPING_ID_NAME)
}

/// The attribute an output expression is solely computed from: the attribute
/// itself, or the single argument of its aggregate through numeric casts.
pub(crate) fn single_child_attribute(expr: &Expr) -> Option<&Attribute> {
    match expr {
        Expr::Column(attr) => Some(attr),
        Expr::Alias { expr, .. } => single_child_attribute(expr),
        Expr::Aggregate(agg) => match agg.single_arg()?.strip_numeric_casts() {
            Expr::Column(attr) => Some(attr),
            _ => None,
        },
        _ => None,
    }
}

/// Typed null to emit instead of pushing `expr`, when the row value its
/// sole input reads is nulled out in this grouping set.
pub(crate) fn null_override(expr: &Expr, row_value: Option<&Expr>) -> Option<Expr> {
    single_child_attribute(expr)?;
    row_value
        .filter(|value| value.is_null_literal())
        .map(|_| Expr::null(expr.data_type()))
}

/// Literal the grouping-id marker takes in this row.
pub(crate) fn grouping_id_override(expr: &Expr, row_value: Option<&Expr>) -> Option<Expr> {
    let attr = single_child_attribute(expr).filter(|a| is_grouping_id(a))?;
    trace!(marker = %attr.name, "Grouping id overridden");
    match row_value {
        Some(literal @ Expr::Literal { .. }) => Some(literal.clone()),
        _ => Some(Expr::null(expr.data_type())),
    }
}
