use std::sync::Arc;

use aggpush_common::error::{Error, Result};
use aggpush_common::types::{DataType, Value};
use aggpush_ir::{
    AggregateExpr, AggregateFunction, Attribute, Expr, ExprId, LogicalPlan, ScalarFunction,
};

use crate::query_builder::QueryBuilder;
use crate::script::{GeneratedFunction, ScriptCompiler, ScriptContext};
use crate::store::{ColumnDescriptor, InMemoryCatalog, StoreRelation};

pub(crate) fn sales_relation() -> StoreRelation {
    StoreRelation::new("sales", "__time")
        .with_column(ColumnDescriptor::dimension("__time", DataType::Timestamp))
        .with_column(ColumnDescriptor::dimension("city", DataType::String))
        .with_column(ColumnDescriptor::dimension("country", DataType::String))
        .with_column(
            ColumnDescriptor::dimension("user_id", DataType::String)
                .with_sketch_metric("user_id_sketch"),
        )
        .with_column(ColumnDescriptor::metric("revenue", DataType::Float64))
        .with_column(ColumnDescriptor::metric("latency", DataType::Int64))
        .with_column(ColumnDescriptor::count_metric("count"))
        .with_column(ColumnDescriptor::dimension("event_date", DataType::String))
        .with_prefer_sketch_metrics(true)
}

/// A relation without a materialized row count.
pub(crate) fn clicks_relation() -> StoreRelation {
    StoreRelation::new("clicks", "__time")
        .with_column(ColumnDescriptor::dimension("__time", DataType::Timestamp))
        .with_column(ColumnDescriptor::dimension("city", DataType::String))
        .with_column(ColumnDescriptor::metric("revenue", DataType::Float64))
}

pub(crate) fn sales_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_relation(sales_relation())
        .with_relation(clicks_relation())
}

pub(crate) fn sales_builder() -> QueryBuilder {
    QueryBuilder::new(Arc::new(sales_relation()))
}

pub(crate) fn no_count_builder() -> QueryBuilder {
    QueryBuilder::new(Arc::new(clicks_relation()))
}

pub(crate) fn attr(id: u64, name: &str, data_type: DataType) -> Attribute {
    Attribute::new(ExprId(id), name, data_type)
}

/// Output of a scan over `sales`, in relation column order.
pub(crate) fn sales_scan() -> LogicalPlan {
    LogicalPlan::Scan {
        table_name: "sales".to_string(),
        output: vec![
            attr(1, "__time", DataType::Timestamp),
            attr(2, "city", DataType::String),
            attr(3, "country", DataType::String),
            attr(4, "user_id", DataType::String),
            attr(5, "revenue", DataType::Float64),
            attr(6, "latency", DataType::Int64),
            attr(7, "count", DataType::Int64),
            attr(8, "event_date", DataType::String),
        ],
    }
}

pub(crate) fn clicks_scan() -> LogicalPlan {
    LogicalPlan::Scan {
        table_name: "clicks".to_string(),
        output: vec![
            attr(11, "__time", DataType::Timestamp),
            attr(12, "city", DataType::String),
            attr(13, "revenue", DataType::Float64),
        ],
    }
}

pub(crate) fn scan_column(scan: &LogicalPlan, name: &str) -> Expr {
    let attr = scan
        .output()
        .into_iter()
        .find(|a| a.name == name)
        .unwrap_or_else(|| panic!("scan has no column {name}"));
    Expr::column(&attr)
}

pub(crate) fn aggregate(id: u64, func: AggregateFunction, args: Vec<Expr>, data_type: DataType) -> Expr {
    Expr::Aggregate(AggregateExpr::new(ExprId(id), func, args, data_type))
}

pub(crate) fn named(expr: Expr, name: &str, id: u64) -> Expr {
    Expr::alias(expr, name, ExprId(id))
}

/// An expansion node over `sales` that computes the given grouping sets.
pub(crate) struct ExpandFixture {
    pub plan: LogicalPlan,
    pub groups: Vec<Attribute>,
    pub values: Vec<Attribute>,
    pub gid: Attribute,
}

pub(crate) const GROUP_ID_BASE: u64 = 1000;
pub(crate) const VALUE_ID_BASE: u64 = 2000;

impl ExpandFixture {
    /// `groups` are the grouping columns, `values` the columns aggregates
    /// read, `sets` the grouping sets by column name.
    pub fn sales(groups: &[&str], values: &[&str], sets: &[&[&str]]) -> Self {
        Self::over(sales_scan(), groups, values, sets)
    }

    pub fn over(scan: LogicalPlan, groups: &[&str], values: &[&str], sets: &[&[&str]]) -> Self {
        let source = |name: &str| match scan_column(&scan, name) {
            Expr::Column(attr) => attr,
            other => panic!("unexpected {other}"),
        };
        let group_sources: Vec<Attribute> = groups.iter().map(|g| source(g)).collect();
        let value_sources: Vec<Attribute> = values.iter().map(|v| source(v)).collect();

        let group_outputs: Vec<Attribute> = group_sources
            .iter()
            .enumerate()
            .map(|(i, a)| attr(GROUP_ID_BASE + i as u64, &a.name, a.data_type))
            .collect();
        let value_outputs: Vec<Attribute> = value_sources
            .iter()
            .enumerate()
            .map(|(i, a)| attr(VALUE_ID_BASE + i as u64, &a.name, a.data_type))
            .collect();
        let gid = attr(3000, "spark_grouping_id", DataType::Int64);

        let projections = sets
            .iter()
            .map(|set| {
                let mut mask = 0i64;
                let mut row: Vec<Expr> = group_sources
                    .iter()
                    .enumerate()
                    .map(|(i, a)| {
                        if set.contains(&a.name.as_str()) {
                            Expr::column(a)
                        } else {
                            mask |= 1 << (group_sources.len() - 1 - i);
                            Expr::null(a.data_type)
                        }
                    })
                    .collect();
                row.extend(value_sources.iter().map(Expr::column));
                row.push(Expr::literal(Value::int64(mask), DataType::Int64));
                row
            })
            .collect();

        let mut output = group_outputs.clone();
        output.extend(value_outputs.iter().cloned());
        output.push(gid.clone());

        Self {
            plan: LogicalPlan::Expand {
                input: Box::new(scan),
                projections,
                output,
            },
            groups: group_outputs,
            values: value_outputs,
            gid,
        }
    }

    pub fn group(&self, name: &str) -> Expr {
        Self::find(&self.groups, name)
    }

    pub fn value(&self, name: &str) -> Expr {
        Self::find(&self.values, name)
    }

    pub fn gid(&self) -> Expr {
        Expr::column(&self.gid)
    }

    /// Group by every grouping column plus the marker.
    pub fn group_by(&self) -> Vec<Expr> {
        let mut group_by: Vec<Expr> = self.groups.iter().map(Expr::column).collect();
        group_by.push(self.gid());
        group_by
    }

    pub fn aggregate(&self, aggregates: Vec<Expr>) -> LogicalPlan {
        LogicalPlan::Aggregate {
            input: Box::new(self.plan.clone()),
            group_by: self.group_by(),
            aggregates,
        }
    }

    fn find(attrs: &[Attribute], name: &str) -> Expr {
        let attr = attrs
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("expansion has no column {name}"));
        Expr::column(attr)
    }
}

/// Script generator stand-in: binds every referenced store column as a
/// parameter and renders the expression as the body.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockScriptCompiler {
    rejected_functions: Vec<ScalarFunction>,
    rejected_aggregates: Vec<AggregateFunction>,
}

impl MockScriptCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_function(mut self, func: ScalarFunction) -> Self {
        self.rejected_functions.push(func);
        self
    }

    pub fn rejecting_aggregate(mut self, func: AggregateFunction) -> Self {
        self.rejected_aggregates.push(func);
        self
    }

    fn rejects(&self, expr: &Expr) -> bool {
        let rejected = match expr {
            Expr::ScalarFunction { func, .. } => self.rejected_functions.contains(func),
            Expr::Aggregate(agg) => self.rejected_aggregates.contains(&agg.func),
            _ => false,
        };
        rejected || expr.children().into_iter().any(|c| self.rejects(c))
    }
}

impl ScriptCompiler for MockScriptCompiler {
    fn compile(
        &self,
        ctx: &ScriptContext<'_>,
        expr: &Expr,
        is_aggregate: bool,
        timezone: &str,
    ) -> Result<GeneratedFunction> {
        if self.rejects(expr) {
            return Err(Error::script_compilation(format!("cannot script {expr}")));
        }
        let mut params: Vec<String> = Vec::new();
        for attr in expr.references() {
            let column = ctx
                .relation
                .column(&attr.name)
                .ok_or_else(|| Error::column_not_found(attr.name.clone()))?;
            if !params.contains(&column.name) {
                params.push(column.name.clone());
            }
        }
        let kind = if is_aggregate { "aggregate" } else { "row" };
        let body = format!(
            "function({}) {{ /* {kind} {timezone} */ return {expr}; }}",
            params.join(", ")
        );
        Ok(GeneratedFunction::new(params, body))
    }
}

macro_rules! assert_aggregation {
    ($builder:expr, $index:expr, $pattern:pat $(if $guard:expr)?) => {
        match $builder.aggregations().get($index) {
            Some($pattern) $(if $guard)? => {}
            other => panic!(
                "Expected aggregation {} to match {}, got {:?}",
                $index,
                stringify!($pattern),
                other
            ),
        }
    };
}

macro_rules! assert_dimension {
    ($builder:expr, $index:expr, $pattern:pat $(if $guard:expr)?) => {
        match $builder.dimensions().get($index) {
            Some($pattern) $(if $guard)? => {}
            other => panic!(
                "Expected dimension {} to match {}, got {:?}",
                $index,
                stringify!($pattern),
                other
            ),
        }
    };
}

pub(crate) use {assert_aggregation, assert_dimension};
