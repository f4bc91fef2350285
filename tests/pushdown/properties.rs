use std::collections::HashMap;

use aggpush::{AggregateExpr, AggregateFunction, AggregationSpec, ArithmeticOp, DataType, Expr, OutputBinding};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::subsequence;

use crate::common::{GroupingSets, agg, assert_unique_result_names, column, events_scan, group_by, named, push};

const GROUPS: [&str; 3] = ["city", "country", "device"];
const KINDS: usize = 10;

/// Aggregate number `kind` over the column resolver, and whether a store
/// without scripting can compute it.
fn aggregate_kind(kind: usize, id: u64, col: &dyn Fn(&str) -> Expr) -> (AggregateExpr, bool) {
    match kind {
        0 => (agg(id, AggregateFunction::Sum, vec![col("price")], DataType::Float64), true),
        1 => (agg(id, AggregateFunction::Sum, vec![col("bytes")], DataType::Int64), true),
        2 => (agg(id, AggregateFunction::Min, vec![col("bytes")], DataType::Int64), true),
        3 => (agg(id, AggregateFunction::Max, vec![col("price")], DataType::Float64), true),
        4 => (agg(id, AggregateFunction::Avg, vec![col("bytes")], DataType::Float64), true),
        5 => (agg(id, AggregateFunction::Count, vec![], DataType::Int64), true),
        6 => (
            agg(id, AggregateFunction::Count, vec![col("user_id")], DataType::Int64).with_distinct(true),
            true,
        ),
        7 => (agg(id, AggregateFunction::StddevSamp, vec![col("price")], DataType::Float64), false),
        8 => (agg(id, AggregateFunction::Sum, vec![col("price")], DataType::Int64), false),
        _ => (agg(id, AggregateFunction::Avg, vec![col("user_id")], DataType::Float64), false),
    }
}

fn build_aggregates(kinds: &[usize], col: &dyn Fn(&str) -> Expr) -> (Vec<Expr>, bool) {
    let mut translatable = true;
    let aggregates = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| {
            let id = 100 + 2 * i as u64;
            let (aggregate, ok) = aggregate_kind(kind, id, col);
            translatable &= ok;
            named(aggregate, &format!("agg_{i}"), id + 1)
        })
        .collect();
    (aggregates, translatable)
}

fn set_of(mask: u8) -> Vec<&'static str> {
    GROUPS
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, g)| *g)
        .collect()
}

/// What the store computes for a sum over `bytes` or over the row-count
/// metric, given the `bytes` value of each row.
fn evaluate(spec: &AggregationSpec, bytes: &[i64]) -> f64 {
    match spec {
        AggregationSpec::Function {
            field_name: Some(field),
            ..
        } if field == "bytes" => bytes.iter().sum::<i64>() as f64,
        AggregationSpec::Function {
            field_name: Some(field),
            ..
        } if field == "count" => bytes.len() as f64,
        other => panic!("unexpected aggregation {other:?}"),
    }
}

proptest! {
    #[test]
    fn average_partials_divide_back_to_the_mean(bytes in vec(-1_000_000i64..1_000_000, 1..64)) {
        let scan = events_scan();
        let avg = named(
            agg(10, AggregateFunction::Avg, vec![column(&scan, "bytes")], DataType::Float64),
            "avg_bytes",
            11,
        );
        let pushed = push(&group_by(&[], vec![avg])).unwrap();
        let query = &pushed.grouping_sets[0].query;

        let partials: HashMap<&str, f64> = query
            .aggregations()
            .iter()
            .map(|spec| (spec.name(), evaluate(spec, &bytes)))
            .collect();
        let [division] = query.post_aggregations() else {
            panic!("expected one post-aggregation");
        };
        prop_assert_eq!(division.op, ArithmeticOp::Div);
        let average = partials[division.fields[0].as_str()] / partials[division.fields[1].as_str()];

        let mean = bytes.iter().map(|&b| b as f64).sum::<f64>() / bytes.len() as f64;
        prop_assert!((average - mean).abs() <= 1e-9 * mean.abs().max(1.0));
    }

    #[test]
    fn plain_aggregate_is_pushed_iff_every_aggregate_translates(
        kinds in vec(0..KINDS, 1..8),
        groups in subsequence(GROUPS.to_vec(), 0..=3),
    ) {
        let scan = events_scan();
        let (aggregates, translatable) = build_aggregates(&kinds, &|name: &str| column(&scan, name));
        let plan = group_by(&groups, aggregates);

        let pushed = push(&plan);
        prop_assert_eq!(pushed.is_some(), translatable);
        if let Some(pushed) = pushed {
            prop_assert_eq!(pushed.grouping_sets.len(), 1);
            let set = &pushed.grouping_sets[0];
            assert_unique_result_names(set);
            prop_assert_eq!(set.query.dimensions().len(), groups.len());
            let bindings = set.bindings(&pushed.aggregates);
            let all_columns = bindings.iter().all(|b| matches!(b, OutputBinding::Column { .. }));
            prop_assert!(all_columns);
        }
    }

    #[test]
    fn grouping_sets_are_pushed_as_a_unit(
        kinds in vec(0..KINDS, 1..6),
        masks in vec(0u8..8, 1..5),
    ) {
        let sets: Vec<Vec<&str>> = masks.iter().map(|&m| set_of(m)).collect();
        let expansion = GroupingSets::new(&GROUPS, &["price", "bytes", "user_id"], &sets);
        let (aggregates, translatable) = build_aggregates(&kinds, &|name: &str| expansion.value(name));
        let plan = expansion.aggregate(aggregates);

        let pushed = push(&plan);
        prop_assert_eq!(pushed.is_some(), translatable);
        if let Some(pushed) = pushed {
            prop_assert_eq!(pushed.grouping_sets.len(), sets.len());
            for (set, names) in pushed.grouping_sets.iter().zip(&sets) {
                assert_unique_result_names(set);
                prop_assert_eq!(set.query.dimensions().len(), names.len());
                let absent = GROUPS.len() - names.len();
                // Absent groups plus the grouping id come back as literals.
                prop_assert_eq!(set.overrides.len(), absent + 1);
            }
        }
    }
}
