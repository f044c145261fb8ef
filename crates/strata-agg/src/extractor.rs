//! Scalar extractors: small expression trees evaluated against one record at a time.
//!
//! Leaves read a numeric field (or a constant); inner nodes subtract, multiply or promote to
//! floating point. Integer leaves stay integral until they meet a float operand or an explicit
//! [`Extractor::to_float`], so `to - from` over two timestamp fields is computed exactly before it is
//! scaled.
//!
//! Trees are evaluated exactly as written. Nothing is reassociated, so floating point rounding is
//! the same on every evaluation of the same tree.

use crate::error::{AggError, AggResult};
use crate::store::{FieldId, RecordRef, RecordStore};
use std::ops::{Mul, Sub};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    fn subtract(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_sub(b)
                .map_or_else(|| Self::Float(a as f64 - b as f64), Self::Int),
            (a, b) => Self::Float(a.as_f64() - b.as_f64()),
        }
    }

    fn multiply(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_mul(b)
                .map_or_else(|| Self::Float(a as f64 * b as f64), Self::Int),
            (a, b) => Self::Float(a.as_f64() * b.as_f64()),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A derived numeric value computed from a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Extractor {
    /// A numeric field. Null cells are a schema error.
    Field(String),
    /// A numeric field whose null cells read as `default`.
    FieldOr { field: String, default: Scalar },
    Constant(Scalar),
    Subtract(Box<Extractor>, Box<Extractor>),
    Multiply(Box<Extractor>, Box<Extractor>),
    ToFloat(Box<Extractor>),
}

impl Extractor {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn field_or(name: impl Into<String>, default: impl Into<Scalar>) -> Self {
        Self::FieldOr {
            field: name.into(),
            default: default.into(),
        }
    }

    pub fn constant(value: impl Into<Scalar>) -> Self {
        Self::Constant(value.into())
    }

    pub fn subtract(self, rhs: Self) -> Self {
        Self::Subtract(Box::new(self), Box::new(rhs))
    }

    pub fn multiply(self, rhs: Self) -> Self {
        Self::Multiply(Box::new(self), Box::new(rhs))
    }

    pub fn to_float(self) -> Self {
        Self::ToFloat(Box::new(self))
    }

    /// Replace every constant-only subtree by its value.
    ///
    /// The folded value is computed with the same operation the evaluator would apply, so the
    /// result of evaluating the tree does not change.
    pub fn fold_constants(&self) -> Self {
        match self {
            Self::Field(_) | Self::FieldOr { .. } | Self::Constant(_) => self.clone(),
            Self::Subtract(a, b) => match (a.fold_constants(), b.fold_constants()) {
                (Self::Constant(a), Self::Constant(b)) => Self::Constant(a.subtract(b)),
                (a, b) => a.subtract(b),
            },
            Self::Multiply(a, b) => match (a.fold_constants(), b.fold_constants()) {
                (Self::Constant(a), Self::Constant(b)) => Self::Constant(a.multiply(b)),
                (a, b) => a.multiply(b),
            },
            Self::ToFloat(inner) => match inner.fold_constants() {
                Self::Constant(c) => Self::Constant(Scalar::Float(c.as_f64())),
                inner => inner.to_float(),
            },
        }
    }

    /// Names of the fields this extractor reads.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Field(name) | Self::FieldOr { field: name, .. } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Constant(_) => {}
            Self::Subtract(a, b) | Self::Multiply(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Self::ToFloat(inner) => inner.collect_fields(out),
        }
    }

    /// Resolve field names against `store`.
    ///
    /// Fails if a field is unknown or not numeric.
    pub fn bind<S: RecordStore + ?Sized>(&self, store: &S) -> AggResult<BoundExtractor> {
        let leaf = |name: &str| -> AggResult<(FieldId, bool)> {
            let field = store.resolve_field(name)?;
            let column_type = store.field_schema(field)?.column_type;
            if !column_type.is_numeric() {
                return Err(AggError::SchemaMismatch {
                    field: name.to_string(),
                    expected: "numeric".to_string(),
                    actual: column_type,
                });
            }
            Ok((field, column_type != strata_columnar::ColumnType::Number))
        };

        Ok(match self {
            Self::Field(name) => {
                let (field, integral) = leaf(name)?;
                BoundExtractor::Field { field, integral }
            }
            Self::FieldOr { field, default } => {
                let (field, integral) = leaf(field)?;
                BoundExtractor::FieldOr {
                    field,
                    integral,
                    default: *default,
                }
            }
            Self::Constant(c) => BoundExtractor::Constant(*c),
            Self::Subtract(a, b) => {
                BoundExtractor::Subtract(Box::new(a.bind(store)?), Box::new(b.bind(store)?))
            }
            Self::Multiply(a, b) => {
                BoundExtractor::Multiply(Box::new(a.bind(store)?), Box::new(b.bind(store)?))
            }
            Self::ToFloat(inner) => BoundExtractor::ToFloat(Box::new(inner.bind(store)?)),
        })
    }

    /// Bind and evaluate in one step. Prefer [`Extractor::bind`] when evaluating many records.
    pub fn evaluate<S: RecordStore>(&self, store: &S, reference: RecordRef) -> AggResult<Scalar> {
        self.bind(store)?.evaluate(store, reference)
    }

    pub fn evaluate_f64<S: RecordStore>(&self, store: &S, reference: RecordRef) -> AggResult<f64> {
        self.evaluate(store, reference).map(Scalar::as_f64)
    }
}

impl Sub for Extractor {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.subtract(rhs)
    }
}

impl Mul for Extractor {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.multiply(rhs)
    }
}

/// An [`Extractor`] with field names resolved to store field ids.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExtractor {
    Field {
        field: FieldId,
        integral: bool,
    },
    FieldOr {
        field: FieldId,
        integral: bool,
        default: Scalar,
    },
    Constant(Scalar),
    Subtract(Box<BoundExtractor>, Box<BoundExtractor>),
    Multiply(Box<BoundExtractor>, Box<BoundExtractor>),
    ToFloat(Box<BoundExtractor>),
}

fn read_field<S: RecordStore>(
    store: &S,
    reference: RecordRef,
    field: FieldId,
    integral: bool,
) -> AggResult<Scalar> {
    if integral {
        store.deserialize::<i64>(reference, field).map(Scalar::Int)
    } else {
        store.deserialize::<f64>(reference, field).map(Scalar::Float)
    }
}

impl BoundExtractor {
    pub fn evaluate<S: RecordStore>(&self, store: &S, reference: RecordRef) -> AggResult<Scalar> {
        match self {
            Self::Field { field, integral } => read_field(store, reference, *field, *integral),
            Self::FieldOr {
                field,
                integral,
                default,
            } => match read_field(store, reference, *field, *integral) {
                Err(AggError::MissingValue { .. }) => Ok(*default),
                other => other,
            },
            Self::Constant(c) => Ok(*c),
            Self::Subtract(a, b) => {
                let a = a.evaluate(store, reference)?;
                let b = b.evaluate(store, reference)?;
                Ok(a.subtract(b))
            }
            Self::Multiply(a, b) => {
                let a = a.evaluate(store, reference)?;
                let b = b.evaluate(store, reference)?;
                Ok(a.multiply(b))
            }
            Self::ToFloat(inner) => Ok(Scalar::Float(inner.evaluate(store, reference)?.as_f64())),
        }
    }

    pub fn evaluate_f64<S: RecordStore>(&self, store: &S, reference: RecordRef) -> AggResult<f64> {
        self.evaluate(store, reference).map(Scalar::as_f64)
    }
}
