#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

/// Logical type of a column.
///
/// `Integer` and `DateTime` share the same physical page layout (`i64`); `DateTime` values are
/// seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColumnType {
    #[default]
    Number,
    Integer,
    DateTime,
    Boolean,
    String,
}

impl ColumnType {
    /// Whether cells of this type can be read as a scalar for arithmetic.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer | Self::DateTime)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Number => "number",
            Self::Integer => "integer",
            Self::DateTime => "datetime",
            Self::Boolean => "boolean",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Integer(i64),
    DateTime(i64),
    Boolean(bool),
    String(Arc<str>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The column type this value would be stored as, or `None` for nulls.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Number(_) => Some(ColumnType::Number),
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::DateTime(_) => Some(ColumnType::DateTime),
            Self::Boolean(_) => Some(ColumnType::Boolean),
            Self::String(_) => Some(ColumnType::String),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Self::String(value)
    }
}
