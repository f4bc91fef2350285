use aggpush::{
    AggregateFunction, AggregationSpec, DataType, DimensionSpec, Expr, LogicalPlan, NativeFunction,
    NoScripts, OutputBinding, PostAggregation, PushdownPlan, PushdownSettings, StoreType, optimize,
};

use crate::common::{EchoScripts, agg, assert_unique_result_names, column, events_catalog, events_scan, group_by, named, push, push_with};

fn column_binding(name: &str, store_type: StoreType, host_type: DataType) -> OutputBinding {
    OutputBinding::Column {
        name: name.to_string(),
        store_type,
        host_type,
    }
}

#[test]
fn test_sum_and_max_by_city() {
    let scan = events_scan();
    let plan = group_by(
        &["city"],
        vec![
            named(
                agg(100, AggregateFunction::Sum, vec![column(&scan, "price")], DataType::Float64),
                "revenue",
                101,
            ),
            named(
                agg(102, AggregateFunction::Max, vec![column(&scan, "bytes")], DataType::Int64),
                "largest",
                103,
            ),
        ],
    );

    let pushed = push(&plan).unwrap();
    assert_eq!(pushed.grouping_sets.len(), 1);
    let query = &pushed.grouping_sets[0].query;
    assert_eq!(
        query.dimensions(),
        &[DimensionSpec::Default {
            dimension: "city".to_string(),
            output_name: "city".to_string(),
        }]
    );
    assert_eq!(
        query.aggregations(),
        &[
            AggregationSpec::Function {
                function: NativeFunction::DoubleSum,
                name: "alias-0".to_string(),
                field_name: Some("price".to_string()),
            },
            AggregationSpec::Function {
                function: NativeFunction::LongMax,
                name: "alias-1".to_string(),
                field_name: Some("bytes".to_string()),
            },
        ]
    );
    assert_eq!(
        pushed.bindings(),
        vec![vec![
            column_binding("city", StoreType::String, DataType::String),
            column_binding("alias-0", StoreType::Double, DataType::Float64),
            column_binding("alias-1", StoreType::Long, DataType::Int64),
        ]]
    );
}

#[test]
fn test_average_of_integral_metric() {
    let scan = events_scan();
    let plan = group_by(
        &["country"],
        vec![named(
            agg(100, AggregateFunction::Avg, vec![column(&scan, "bytes")], DataType::Float64),
            "avg_bytes",
            101,
        )],
    );

    let pushed = push(&plan).unwrap();
    let query = &pushed.grouping_sets[0].query;
    assert_eq!(
        query.aggregations(),
        &[
            AggregationSpec::Function {
                function: NativeFunction::LongSum,
                name: "alias-0".to_string(),
                field_name: Some("bytes".to_string()),
            },
            AggregationSpec::Function {
                function: NativeFunction::LongSum,
                name: "alias-1".to_string(),
                field_name: Some("count".to_string()),
            },
        ]
    );
    assert_eq!(
        query.post_aggregations(),
        &[PostAggregation::division("alias-2", "alias-0", "alias-1")]
    );
    assert_eq!(
        pushed.bindings()[0][1],
        column_binding("alias-2", StoreType::Double, DataType::Float64)
    );
}

#[test]
fn test_count_star_reads_count_metric() {
    let plan = group_by(
        &["device"],
        vec![named(
            agg(100, AggregateFunction::Count, vec![], DataType::Int64),
            "rows",
            101,
        )],
    );

    let pushed = push(&plan).unwrap();
    assert_eq!(
        pushed.grouping_sets[0].query.aggregations(),
        &[AggregationSpec::Function {
            function: NativeFunction::LongSum,
            name: "alias-0".to_string(),
            field_name: Some("count".to_string()),
        }]
    );
}

#[test]
fn test_distinct_counts() {
    let scan = events_scan();
    let plan = group_by(
        &["city"],
        vec![
            named(
                agg(100, AggregateFunction::Count, vec![column(&scan, "user_id")], DataType::Int64)
                    .with_distinct(true),
                "users",
                101,
            ),
            named(
                agg(
                    102,
                    AggregateFunction::ApproxCountDistinct,
                    vec![column(&scan, "country")],
                    DataType::Int64,
                ),
                "countries",
                103,
            ),
        ],
    );

    let pushed = push(&plan).unwrap();
    assert_eq!(
        pushed.grouping_sets[0].query.aggregations(),
        &[
            AggregationSpec::HyperUnique {
                name: "alias-0".to_string(),
                field_name: "user_sketch".to_string(),
            },
            AggregationSpec::Cardinality {
                name: "alias-1".to_string(),
                fields: vec!["country".to_string()],
            },
        ]
    );
}

#[test]
fn test_narrowing_sum_is_not_pushed() {
    let scan = events_scan();
    let plan = group_by(
        &["city"],
        vec![named(
            agg(100, AggregateFunction::Sum, vec![column(&scan, "price")], DataType::Int64),
            "revenue",
            101,
        )],
    );

    assert!(push(&plan).is_none());
}

#[test]
fn test_unsupported_aggregate_needs_scripts() {
    let scan = events_scan();
    let plan = group_by(
        &["city"],
        vec![named(
            agg(100, AggregateFunction::StddevSamp, vec![column(&scan, "price")], DataType::Float64),
            "spread",
            101,
        )],
    );

    assert!(push(&plan).is_none());

    let pushed = push_with(&plan, &EchoScripts, &PushdownSettings::default()).unwrap();
    let set = &pushed.grouping_sets[0];
    match set.query.aggregations() {
        [AggregationSpec::Script { name, function }] => {
            assert_eq!(name, "alias-0");
            assert_eq!(function.params, vec!["price".to_string()]);
        }
        other => panic!("Expected a single script aggregation, got {other:?}"),
    }
    assert_unique_result_names(set);

    let no_fallback = PushdownSettings {
        script_fallback: false,
        ..PushdownSettings::default()
    };
    assert!(push_with(&plan, &EchoScripts, &no_fallback).is_none());
}

#[test]
fn test_unknown_relation_stays_on_host() {
    let scan = LogicalPlan::Scan {
        table_name: "missing".to_string(),
        output: events_scan().output(),
    };
    let plan = LogicalPlan::Aggregate {
        group_by: vec![column(&scan, "city")],
        aggregates: vec![column(&scan, "city")],
        input: Box::new(scan),
    };

    assert!(push(&plan).is_none());
    let optimized = optimize(&plan, &events_catalog(), &NoScripts).unwrap();
    assert_eq!(optimized, PushdownPlan::from_logical(plan));
}

#[test]
fn test_filter_below_aggregate_blocks_pushdown() {
    let scan = events_scan();
    let city = column(&scan, "city");
    let plan = LogicalPlan::Aggregate {
        group_by: vec![city.clone()],
        aggregates: vec![city.clone()],
        input: Box::new(LogicalPlan::Filter {
            predicate: city,
            input: Box::new(scan),
        }),
    };

    assert!(push(&plan).is_none());
}

#[test]
fn test_optimize_pushes_nested_aggregate() {
    let scan = events_scan();
    let aggregate = group_by(
        &["city"],
        vec![named(
            agg(100, AggregateFunction::Min, vec![column(&scan, "price")], DataType::Float64),
            "cheapest",
            101,
        )],
    );
    let outputs: Vec<Expr> = aggregate.output().iter().map(Expr::column).collect();
    let plan = LogicalPlan::Project {
        input: Box::new(aggregate),
        expressions: outputs,
    };

    let optimized = optimize(&plan, &events_catalog(), &NoScripts).unwrap();
    assert!(matches!(optimized, PushdownPlan::Project { .. }));
    let pushed = optimized.pushed_aggregates();
    assert_eq!(pushed.len(), 1);
    assert_eq!(
        pushed[0].grouping_sets[0].query.aggregations(),
        &[AggregationSpec::Function {
            function: NativeFunction::DoubleMin,
            name: "alias-0".to_string(),
            field_name: Some("price".to_string()),
        }]
    );
    assert_eq!(optimized.output(), plan.output());
}

#[test]
fn test_query_serializes_to_native_json() {
    let scan = events_scan();
    let plan = group_by(
        &["city"],
        vec![named(
            agg(100, AggregateFunction::Sum, vec![column(&scan, "bytes")], DataType::Int64),
            "total",
            101,
        )],
    );

    let pushed = push(&plan).unwrap();
    let json = serde_json::to_value(&pushed.grouping_sets[0].query).unwrap();
    assert_eq!(
        json["dimensions"][0],
        serde_json::json!({ "type": "default", "dimension": "city", "outputName": "city" })
    );
    assert_eq!(
        json["aggregations"][0],
        serde_json::json!({ "type": "longSum", "name": "alias-0", "fieldName": "bytes" })
    );
}
