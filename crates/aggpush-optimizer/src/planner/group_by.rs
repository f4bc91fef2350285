use aggpush_ir::Expr;
use tracing::trace;

use super::context::TranslationContext;
use super::time_format::{TimeExtraction, match_time_extraction, match_time_format};
use crate::query_builder::{DimensionSpec, ExtractionFn, OutputAttribute, QueryBuilder, StoreType};

type GroupRecognizer =
    fn(&TranslationContext<'_>, &QueryBuilder, &Expr, &Expr) -> Option<QueryBuilder>;

/// Tried in order; the first match wins.
const GROUP_RECOGNIZERS: &[(&str, GroupRecognizer)] = &[
    ("direct_dimension", direct_dimension),
    ("time_format", time_format),
    ("time_extraction", time_extraction),
    ("script_dimension", script_dimension),
];

/// Translates one group expression, given its aligned expansion expression,
/// into a dimension of `builder`.
pub(crate) fn translate_group_expr(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    group: &Expr,
    expanded: &Expr,
) -> Option<QueryBuilder> {
    let expanded = ctx.with_store_names(expanded);
    for (name, recognizer) in GROUP_RECOGNIZERS {
        if let Some(next) = recognizer(ctx, builder, group, &expanded) {
            trace!(recognizer = name, group = %group, "Group expression translated");
            return Some(next);
        }
    }
    trace!(group = %group, "No recognizer matched group expression");
    None
}

fn record(
    builder: &QueryBuilder,
    spec: DimensionSpec,
    group: &Expr,
    store_type: StoreType,
) -> QueryBuilder {
    let attr = OutputAttribute::new(
        spec.output_name(),
        group.clone(),
        store_type,
        group.data_type(),
    );
    builder.with_dimension(spec).with_output_attribute(attr)
}

fn direct_dimension(
    _ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    group: &Expr,
    expanded: &Expr,
) -> Option<QueryBuilder> {
    let Expr::Column(source) = expanded.strip_alias() else {
        return None;
    };
    let column = builder.relation().non_time_dimension(&source.name)?;
    let (output_name, builder) = builder.output_name(group.output_name());
    let spec = DimensionSpec::Default {
        dimension: column.name.clone(),
        output_name,
    };
    let store_type = StoreType::of(column.data_type);
    Some(record(&builder, spec, group, store_type))
}

fn extraction_dimension(
    builder: &QueryBuilder,
    group: &Expr,
    extraction: TimeExtraction,
) -> QueryBuilder {
    let (output_name, builder) = builder.output_name(group.output_name());
    let spec = DimensionSpec::Extraction {
        dimension: extraction.dimension,
        output_name,
        extraction_fn: extraction.extraction_fn,
    };
    record(&builder, spec, group, StoreType::String)
}

fn time_format(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    group: &Expr,
    expanded: &Expr,
) -> Option<QueryBuilder> {
    let extraction = match_time_format(
        builder.relation(),
        expanded.strip_alias(),
        &ctx.settings.timezone,
    )?;
    Some(extraction_dimension(builder, group, extraction))
}

fn time_extraction(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    group: &Expr,
    _expanded: &Expr,
) -> Option<QueryBuilder> {
    let source = ctx.with_store_names(group);
    let extraction = match_time_extraction(builder.relation(), &source, &ctx.settings.timezone)?;
    Some(extraction_dimension(builder, group, extraction))
}

fn script_dimension(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    group: &Expr,
    expanded: &Expr,
) -> Option<QueryBuilder> {
    let function = ctx.compile(builder, expanded.strip_alias(), false)?;
    let dimension = function.sole_param()?.to_string();
    let (output_name, builder) = builder.next_alias();
    let spec = DimensionSpec::Extraction {
        dimension,
        output_name,
        extraction_fn: ExtractionFn::Script { function },
    };
    Some(record(&builder, spec, group, StoreType::String))
}
