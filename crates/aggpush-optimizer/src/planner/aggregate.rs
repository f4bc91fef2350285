use aggpush_common::types::DataType;
use aggpush_ir::{AggregateExpr, AggregateFunction, AggregateMode, Expr};
use tracing::trace;

use super::context::TranslationContext;
use crate::query_builder::{
    AggregationSpec, NativeFunction, OutputAttribute, PostAggregation, QueryBuilder, StoreType,
};
use crate::store::ColumnDescriptor;

type AggregateRecognizer =
    fn(&TranslationContext<'_>, &QueryBuilder, &AggregateExpr) -> Option<QueryBuilder>;

/// Tried in order; the first match wins. Averages that need scripting never
/// reach this list.
const AGGREGATE_RECOGNIZERS: &[(&str, AggregateRecognizer)] = &[
    ("count_star", count_star),
    ("native", native),
    ("script_aggregate", script_aggregate),
];

/// Translates one aggregate into aggregations of `builder`. Aggregates the
/// grouping set overrides with a literal are left out of the query.
pub(crate) fn translate_aggregate(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    agg: &AggregateExpr,
) -> Option<QueryBuilder> {
    if ctx.is_overridden(agg.id) {
        trace!(aggregate = %agg.id, "Aggregate overridden by literal");
        return Some(builder.clone());
    }
    if needs_script_average(ctx, builder, agg) {
        let next = script_average(ctx, builder, agg);
        match &next {
            Some(_) => trace!(aggregate = %agg.id, "Average translated as script partials"),
            None => trace!(aggregate = %agg.id, "Script average partial failed"),
        }
        return next;
    }
    for (name, recognizer) in AGGREGATE_RECOGNIZERS {
        if let Some(next) = recognizer(ctx, builder, agg) {
            trace!(recognizer = name, aggregate = %agg.id, "Aggregate translated");
            return Some(next);
        }
    }
    trace!(aggregate = %agg.id, function = agg.func.name(), "No recognizer matched aggregate");
    None
}

fn output(builder: &QueryBuilder, name: &str, agg: &AggregateExpr, store_type: StoreType) -> QueryBuilder {
    builder.with_output_attribute(OutputAttribute::new(
        name,
        Expr::Aggregate(agg.clone()),
        store_type,
        agg.data_type,
    ))
}

fn push_single(
    builder: &QueryBuilder,
    agg: &AggregateExpr,
    spec: impl FnOnce(String) -> AggregationSpec,
    store_type: StoreType,
) -> QueryBuilder {
    let (name, builder) = builder.next_alias();
    let builder = builder.with_aggregation(spec(name.clone()));
    output(&builder, &name, agg, store_type)
}

/// Attaches `sum / count` as the aggregate's result.
fn finish_average(builder: &QueryBuilder, agg: &AggregateExpr, sum: &str, count: &str) -> QueryBuilder {
    let (name, builder) = builder.next_alias();
    let builder = builder.with_post_aggregation(PostAggregation::division(&name, sum, count));
    output(&builder, &name, agg, StoreType::Double)
}

fn row_count_spec(builder: &QueryBuilder, name: String) -> AggregationSpec {
    match builder.relation().count_metric() {
        Some(metric) => AggregationSpec::Function {
            function: NativeFunction::LongSum,
            name,
            field_name: Some(metric.name.clone()),
        },
        None => AggregationSpec::Function {
            function: NativeFunction::Count,
            name,
            field_name: None,
        },
    }
}

fn is_native_candidate(agg: &AggregateExpr) -> bool {
    agg.mode == AggregateMode::Complete
}

fn is_count_of_one(ctx: &TranslationContext<'_>, agg: &AggregateExpr) -> bool {
    match agg.args.as_slice() {
        [] => true,
        [arg] => match ctx.resolve(arg).strip_alias().strip_casts() {
            Expr::Literal { value, .. } => value.is_one(),
            Expr::Column(attr) => attr.name == "1",
            _ => false,
        },
        _ => false,
    }
}

fn count_star(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    agg: &AggregateExpr,
) -> Option<QueryBuilder> {
    if agg.func != AggregateFunction::Count
        || agg.distinct
        || !is_native_candidate(agg)
        || !is_count_of_one(ctx, agg)
    {
        return None;
    }
    Some(push_single(
        builder,
        agg,
        |name| row_count_spec(builder, name),
        StoreType::Long,
    ))
}

/// Averages the store cannot compute from a bare metric column.
fn needs_script_average(ctx: &TranslationContext<'_>, builder: &QueryBuilder, agg: &AggregateExpr) -> bool {
    agg.func == AggregateFunction::Avg
        && !agg.distinct
        && ctx.settings.script_fallback
        && agg
            .single_arg()
            .and_then(|arg| ctx.resolve_column(builder, arg))
            .is_none_or(|col| !col.is_metric())
}

/// `agg` with its arguments expressed over the expansion node's input.
fn resolved(ctx: &TranslationContext<'_>, agg: &AggregateExpr) -> AggregateExpr {
    AggregateExpr {
        args: agg.args.iter().map(|a| ctx.resolve(a)).collect(),
        ..agg.clone()
    }
}

fn partial(agg: &AggregateExpr, func: AggregateFunction, data_type: DataType) -> Expr {
    Expr::Aggregate(AggregateExpr {
        func,
        data_type,
        ..agg.clone()
    })
}

fn script_average(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    agg: &AggregateExpr,
) -> Option<QueryBuilder> {
    let source = resolved(ctx, agg);

    let sum_fn = ctx.compile(builder, &partial(&source, AggregateFunction::Sum, DataType::Float64), true)?;
    let (sum, builder) = builder.next_alias();
    let builder = builder.with_aggregation(AggregationSpec::Script {
        name: sum.clone(),
        function: sum_fn,
    });

    let count_fn = ctx.compile(&builder, &partial(&source, AggregateFunction::Count, DataType::Int64), true)?;
    let (count, builder) = builder.next_alias();
    let builder = builder.with_aggregation(AggregationSpec::Script {
        name: count.clone(),
        function: count_fn,
    });

    Some(finish_average(&builder, agg, &sum, &count))
}

const NATIVE_RECOGNIZERS: &[AggregateRecognizer] = &[approx_distinct, metric_aggregate];

fn native(ctx: &TranslationContext<'_>, builder: &QueryBuilder, agg: &AggregateExpr) -> Option<QueryBuilder> {
    if !is_native_candidate(agg) {
        return None;
    }
    NATIVE_RECOGNIZERS
        .iter()
        .find_map(|recognizer| recognizer(ctx, builder, agg))
}

fn approx_distinct(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    agg: &AggregateExpr,
) -> Option<QueryBuilder> {
    let is_distinct_count = match agg.func {
        AggregateFunction::ApproxCountDistinct => true,
        AggregateFunction::Count => agg.distinct,
        _ => false,
    };
    if !is_distinct_count {
        return None;
    }
    let column = ctx.resolve_column(builder, agg.single_arg()?)?;
    let sketch = column
        .sketch_metric
        .clone()
        .filter(|_| builder.relation().prefer_sketch_metrics);
    let next = match sketch {
        Some(field_name) => push_single(
            builder,
            agg,
            |name| AggregationSpec::HyperUnique { name, field_name },
            StoreType::Double,
        ),
        None if column.is_dimension() => {
            let fields = vec![column.name.clone()];
            push_single(
                builder,
                agg,
                |name| AggregationSpec::Cardinality { name, fields },
                StoreType::Double,
            )
        }
        None => return None,
    };
    Some(next)
}

fn native_function(func: AggregateFunction, column: &ColumnDescriptor) -> Option<NativeFunction> {
    let integral = column.data_type.is_integral();
    let function = match (func, integral) {
        (AggregateFunction::Sum, true) => NativeFunction::LongSum,
        (AggregateFunction::Sum, false) => NativeFunction::DoubleSum,
        (AggregateFunction::Min, true) => NativeFunction::LongMin,
        (AggregateFunction::Min, false) => NativeFunction::DoubleMin,
        (AggregateFunction::Max, true) => NativeFunction::LongMax,
        (AggregateFunction::Max, false) => NativeFunction::DoubleMax,
        _ => return None,
    };
    Some(function)
}

/// The aggregate's declared type must already be the widest of the two.
fn type_compatible(agg: &AggregateExpr, column: &ColumnDescriptor) -> bool {
    agg.data_type.tightest_common_type(&column.data_type) == Some(agg.data_type)
}

fn metric_aggregate(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    agg: &AggregateExpr,
) -> Option<QueryBuilder> {
    if agg.distinct {
        return None;
    }
    let column = ctx.resolve_column(builder, agg.single_arg()?)?;
    if !column.is_metric() || !column.data_type.is_numeric() {
        return None;
    }

    if agg.func == AggregateFunction::Avg {
        let sum_fn = native_function(AggregateFunction::Sum, column)?;
        let field = column.name.clone();
        let (sum, builder) = builder.next_alias();
        let builder = builder.with_aggregation(AggregationSpec::Function {
            function: sum_fn,
            name: sum.clone(),
            field_name: Some(field),
        });
        let (count, next) = builder.next_alias();
        let builder = next.with_aggregation(row_count_spec(&next, count.clone()));
        return Some(finish_average(&builder, agg, &sum, &count));
    }

    if !type_compatible(agg, column) {
        trace!(
            aggregate = %agg.id,
            declared = %agg.data_type,
            metric = %column.data_type,
            "Aggregate type incompatible with metric"
        );
        return None;
    }
    let function = native_function(agg.func, column)?;
    let field = column.name.clone();
    Some(push_single(
        builder,
        agg,
        |name| AggregationSpec::Function {
            function,
            name,
            field_name: Some(field),
        },
        function.store_type(),
    ))
}

fn script_aggregate(
    ctx: &TranslationContext<'_>,
    builder: &QueryBuilder,
    agg: &AggregateExpr,
) -> Option<QueryBuilder> {
    let function = ctx.compile(builder, &Expr::Aggregate(resolved(ctx, agg)), true)?;
    Some(push_single(
        builder,
        agg,
        |name| AggregationSpec::Script { name, function },
        StoreType::of(agg.data_type),
    ))
}
