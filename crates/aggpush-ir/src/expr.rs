use std::fmt;

use aggpush_common::types::{DataType, Value};
use serde::{Deserialize, Serialize};

/// Stable identity of a named expression, preserved across indirection layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u64);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub id: ExprId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Attribute {
    pub fn new(id: ExprId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    ApproxCountDistinct,
    First,
    Last,
    StddevSamp,
    VarSamp,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
            AggregateFunction::ApproxCountDistinct => "approx_count_distinct",
            AggregateFunction::First => "first",
            AggregateFunction::Last => "last",
            AggregateFunction::StddevSamp => "stddev_samp",
            AggregateFunction::VarSamp => "var_samp",
        }
    }
}

/// Evaluation mode assigned by the host planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregateMode {
    Partial,
    Final,
    #[default]
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub id: ExprId,
    pub func: AggregateFunction,
    pub args: Vec<Expr>,
    pub distinct: bool,
    pub mode: AggregateMode,
    pub data_type: DataType,
}

impl AggregateExpr {
    pub fn new(id: ExprId, func: AggregateFunction, args: Vec<Expr>, data_type: DataType) -> Self {
        Self {
            id,
            func,
            args,
            distinct: false,
            mode: AggregateMode::Complete,
            data_type,
        }
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_mode(mut self, mode: AggregateMode) -> Self {
        self.mode = mode;
        self
    }

    /// The sole argument, if the function takes exactly one.
    pub fn single_arg(&self) -> Option<&Expr> {
        match self.args.as_slice() {
            [arg] => Some(arg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarFunction {
    DateFormat,
    ToTimestamp,
    DateTrunc,
    Year,
    Month,
    DayOfMonth,
    Hour,
    Minute,
    Upper,
    Lower,
    Concat,
    Substring,
    Coalesce,
}

impl ScalarFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::DateFormat => "date_format",
            ScalarFunction::ToTimestamp => "to_timestamp",
            ScalarFunction::DateTrunc => "date_trunc",
            ScalarFunction::Year => "year",
            ScalarFunction::Month => "month",
            ScalarFunction::DayOfMonth => "dayofmonth",
            ScalarFunction::Hour => "hour",
            ScalarFunction::Minute => "minute",
            ScalarFunction::Upper => "upper",
            ScalarFunction::Lower => "lower",
            ScalarFunction::Concat => "concat",
            ScalarFunction::Substring => "substring",
            ScalarFunction::Coalesce => "coalesce",
        }
    }

    fn return_type(&self, args: &[Expr]) -> DataType {
        match self {
            ScalarFunction::DateFormat
            | ScalarFunction::Upper
            | ScalarFunction::Lower
            | ScalarFunction::Concat
            | ScalarFunction::Substring => DataType::String,
            ScalarFunction::ToTimestamp | ScalarFunction::DateTrunc => DataType::Timestamp,
            ScalarFunction::Year
            | ScalarFunction::Month
            | ScalarFunction::DayOfMonth
            | ScalarFunction::Hour
            | ScalarFunction::Minute => DataType::Int32,
            ScalarFunction::Coalesce => args
                .iter()
                .map(Expr::data_type)
                .find(|t| *t != DataType::Null)
                .unwrap_or(DataType::Null),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Column(Attribute),
    Literal {
        value: Value,
        data_type: DataType,
    },
    Alias {
        expr: Box<Expr>,
        name: String,
        id: ExprId,
    },
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    ScalarFunction {
        func: ScalarFunction,
        args: Vec<Expr>,
    },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Aggregate(AggregateExpr),
}

impl Expr {
    pub fn column(attr: &Attribute) -> Self {
        Expr::Column(attr.clone())
    }

    pub fn literal(value: Value, data_type: DataType) -> Self {
        Expr::Literal { value, data_type }
    }

    pub fn null(data_type: DataType) -> Self {
        Expr::Literal {
            value: Value::Null,
            data_type,
        }
    }

    pub fn string_lit(s: impl Into<String>) -> Self {
        Expr::Literal {
            value: Value::string(s),
            data_type: DataType::String,
        }
    }

    pub fn alias(expr: Expr, name: impl Into<String>, id: ExprId) -> Self {
        Expr::Alias {
            expr: Box::new(expr),
            name: name.into(),
            id,
        }
    }

    pub fn cast(expr: Expr, data_type: DataType) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            data_type,
        }
    }

    pub fn function(func: ScalarFunction, args: Vec<Expr>) -> Self {
        Expr::ScalarFunction { func, args }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Column(attr) => attr.data_type,
            Expr::Literal { data_type, .. } => *data_type,
            Expr::Alias { expr, .. } => expr.data_type(),
            Expr::Cast { data_type, .. } => *data_type,
            Expr::ScalarFunction { func, args } => func.return_type(args),
            Expr::BinaryOp { left, op, right } => match op {
                BinaryOp::Div => DataType::Float64,
                _ => left
                    .data_type()
                    .tightest_common_type(&right.data_type())
                    .unwrap_or_else(|| left.data_type()),
            },
            Expr::Aggregate(agg) => agg.data_type,
        }
    }

    /// Name under which this expression appears in its node's output.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Expr::Column(attr) => Some(&attr.name),
            Expr::Alias { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Identity under which this expression appears in its node's output.
    pub fn output_id(&self) -> Option<ExprId> {
        match self {
            Expr::Column(attr) => Some(attr.id),
            Expr::Alias { id, .. } => Some(*id),
            Expr::Aggregate(agg) => Some(agg.id),
            _ => None,
        }
    }

    pub fn to_attribute(&self) -> Option<Attribute> {
        match self {
            Expr::Column(attr) => Some(attr.clone()),
            Expr::Alias { expr, name, id } => Some(Attribute::new(*id, name.clone(), expr.data_type())),
            _ => None,
        }
    }

    pub fn strip_alias(&self) -> &Expr {
        match self {
            Expr::Alias { expr, .. } => expr.strip_alias(),
            other => other,
        }
    }

    pub fn strip_casts(&self) -> &Expr {
        match self {
            Expr::Cast { expr, .. } => expr.strip_casts(),
            other => other,
        }
    }

    /// Strips casts between numeric types only.
    pub fn strip_numeric_casts(&self) -> &Expr {
        match self {
            Expr::Cast { expr, data_type }
                if data_type.is_numeric()
                    && (expr.data_type().is_numeric() || expr.data_type() == DataType::Null) =>
            {
                expr.strip_numeric_casts()
            }
            other => other,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(
            self.strip_casts(),
            Expr::Literal {
                value: Value::Null,
                ..
            }
        )
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self.strip_casts() {
            Expr::Literal { value, .. } => value.as_str(),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Literal { .. } => vec![],
            Expr::Alias { expr, .. } | Expr::Cast { expr, .. } => vec![expr.as_ref()],
            Expr::ScalarFunction { args, .. } => args.iter().collect(),
            Expr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Aggregate(agg) => agg.args.iter().collect(),
        }
    }

    /// Aggregate sub-expressions in first-occurrence order, one per identity.
    pub fn collect_aggregates(&self) -> Vec<&AggregateExpr> {
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a AggregateExpr>) {
            if let Expr::Aggregate(agg) = expr {
                if !out.iter().any(|seen| seen.id == agg.id) {
                    out.push(agg);
                }
                return;
            }
            for child in expr.children() {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    pub fn references(&self) -> Vec<&Attribute> {
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a Attribute>) {
            if let Expr::Column(attr) = expr {
                if !out.iter().any(|seen| seen.id == attr.id) {
                    out.push(attr);
                }
                return;
            }
            for child in expr.children() {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Rebuilds the tree, replacing every column for which `f` returns a value.
    pub fn transform_columns<F>(&self, f: &F) -> Expr
    where
        F: Fn(&Attribute) -> Option<Expr>,
    {
        match self {
            Expr::Column(attr) => f(attr).unwrap_or_else(|| self.clone()),
            Expr::Literal { .. } => self.clone(),
            Expr::Alias { expr, name, id } => Expr::Alias {
                expr: Box::new(expr.transform_columns(f)),
                name: name.clone(),
                id: *id,
            },
            Expr::Cast { expr, data_type } => Expr::Cast {
                expr: Box::new(expr.transform_columns(f)),
                data_type: *data_type,
            },
            Expr::ScalarFunction { func, args } => Expr::ScalarFunction {
                func: *func,
                args: args.iter().map(|a| a.transform_columns(f)).collect(),
            },
            Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
                left: Box::new(left.transform_columns(f)),
                op: *op,
                right: Box::new(right.transform_columns(f)),
            },
            Expr::Aggregate(agg) => Expr::Aggregate(AggregateExpr {
                args: agg.args.iter().map(|a| a.transform_columns(f)).collect(),
                ..agg.clone()
            }),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(attr) => write!(f, "{}{}", attr.name, attr.id),
            Expr::Literal { value, .. } => write!(f, "{}", value),
            Expr::Alias { expr, name, id } => write!(f, "{} AS {}{}", expr, name, id),
            Expr::Cast { expr, data_type } => write!(f, "CAST({} AS {})", expr, data_type),
            Expr::ScalarFunction { func, args } => {
                write!(f, "{}(", func.name())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Aggregate(agg) => {
                write!(f, "{}(", agg.func.name())?;
                if agg.distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, &agg.args)?;
                write!(f, "){}", agg.id)
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}
