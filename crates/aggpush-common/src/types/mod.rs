use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Host-side declared type of a plan expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Date,
    Timestamp,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_fractional(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Int8 => Some(0),
            DataType::Int16 => Some(1),
            DataType::Int32 => Some(2),
            DataType::Int64 => Some(3),
            DataType::Float32 => Some(4),
            DataType::Float64 => Some(5),
            _ => None,
        }
    }

    /// Tightest type both sides widen to without loss, if any.
    ///
    /// Identical types and `Null` against anything resolve trivially; two
    /// numeric types resolve to the wider one. Every other pair has no common
    /// supertype.
    pub fn tightest_common_type(&self, other: &DataType) -> Option<DataType> {
        if self == other {
            return Some(*self);
        }
        match (self, other) {
            (DataType::Null, t) | (t, DataType::Null) => Some(*t),
            _ => match (self.numeric_rank(), other.numeric_rank()) {
                (Some(a), Some(b)) => Some(if a >= b { *self } else { *other }),
                _ => None,
            },
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::Int8 => write!(f, "TINYINT"),
            DataType::Int16 => write!(f, "SMALLINT"),
            DataType::Int32 => write!(f, "INT"),
            DataType::Int64 => write!(f, "BIGINT"),
            DataType::Float32 => write!(f, "FLOAT"),
            DataType::Float64 => write!(f, "DOUBLE"),
            DataType::String => write!(f, "STRING"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    String(String),
}

impl Value {
    pub fn null() -> Self {
        Value::Null
    }

    pub fn int64(v: i64) -> Self {
        Value::Int64(v)
    }

    pub fn float64(v: f64) -> Self {
        Value::Float64(OrderedFloat(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// True for the integral or fractional literal one.
    pub fn is_one(&self) -> bool {
        match self {
            Value::Int64(v) => *v == 1,
            Value::Float64(v) => v.0 == 1.0,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v.0),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
        }
    }
}
