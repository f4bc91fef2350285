use aggpush_ir::{Expr, ScalarFunction};

use crate::query_builder::ExtractionFn;
use crate::store::StoreRelation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TimeExtraction {
    pub dimension: String,
    pub extraction_fn: ExtractionFn,
}

enum TimeSource {
    TimeColumn(String),
    Parsed {
        dimension: String,
        input_format: String,
    },
}

fn canonical_timezone(tz: &str) -> Option<String> {
    tz.parse::<chrono_tz::Tz>()
        .ok()
        .map(|tz| tz.name().to_string())
}

fn time_source(relation: &StoreRelation, expr: &Expr) -> Option<TimeSource> {
    match expr.strip_casts() {
        Expr::Column(attr) if relation.is_time_column(&attr.name) => {
            Some(TimeSource::TimeColumn(relation.time_column.clone()))
        }
        Expr::ScalarFunction {
            func: ScalarFunction::ToTimestamp,
            args,
        } => match args.as_slice() {
            [column, format] => match column.strip_casts() {
                Expr::Column(attr) => {
                    let dimension = relation.non_time_dimension(&attr.name)?;
                    Some(TimeSource::Parsed {
                        dimension: dimension.name.clone(),
                        input_format: format.as_string_literal()?.to_string(),
                    })
                }
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn extraction(source: TimeSource, output_format: &str, timezone: String) -> TimeExtraction {
    match source {
        TimeSource::TimeColumn(dimension) => TimeExtraction {
            dimension,
            extraction_fn: ExtractionFn::TimeFormat {
                format: output_format.to_string(),
                timezone,
            },
        },
        TimeSource::Parsed {
            dimension,
            input_format,
        } => TimeExtraction {
            dimension,
            extraction_fn: ExtractionFn::TimeParse {
                input_format,
                output_format: output_format.to_string(),
                timezone,
            },
        },
    }
}

/// `date_format(ts, 'fmt' [, 'tz'])` over the time column, or over
/// `to_timestamp(dim, 'in_fmt')` for a string dimension holding timestamps.
pub(crate) fn match_time_format(
    relation: &StoreRelation,
    expr: &Expr,
    default_timezone: &str,
) -> Option<TimeExtraction> {
    let Expr::ScalarFunction {
        func: ScalarFunction::DateFormat,
        args,
    } = expr.strip_casts()
    else {
        return None;
    };
    let (ts, format, timezone) = match args.as_slice() {
        [ts, format] => (ts, format.as_string_literal()?, default_timezone),
        [ts, format, tz] => (ts, format.as_string_literal()?, tz.as_string_literal()?),
        _ => return None,
    };
    let timezone = canonical_timezone(timezone)?;
    let source = time_source(relation, ts)?;
    Some(extraction(source, format, timezone))
}

/// `year(ts)`, `month(ts)`, `dayofmonth(ts)`, `hour(ts)`, `minute(ts)`.
pub(crate) fn match_time_extraction(
    relation: &StoreRelation,
    expr: &Expr,
    default_timezone: &str,
) -> Option<TimeExtraction> {
    let Expr::ScalarFunction { func, args } = expr.strip_alias().strip_casts() else {
        return None;
    };
    let format = match func {
        ScalarFunction::Year => "yyyy",
        ScalarFunction::Month => "MM",
        ScalarFunction::DayOfMonth => "dd",
        ScalarFunction::Hour => "HH",
        ScalarFunction::Minute => "mm",
        _ => return None,
    };
    let [ts] = args.as_slice() else {
        return None;
    };
    let timezone = canonical_timezone(default_timezone)?;
    let source = time_source(relation, ts)?;
    Some(extraction(source, format, timezone))
}
