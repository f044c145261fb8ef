use crate::store::RecordRef;
use strata_columnar::{ColumnType, TableError};

pub type AggResult<T> = Result<T, AggError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("schema mismatch for field {field}: expected {expected}, found {actual}")]
    SchemaMismatch {
        field: String,
        expected: String,
        actual: ColumnType,
    },

    #[error("row has {actual} values, schema has {expected} fields")]
    RowLength { expected: usize, actual: usize },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("field {field} has no value for record {reference}")]
    MissingValue { field: String, reference: RecordRef },

    #[error("invalid record reference {0}")]
    InvalidReference(RecordRef),

    #[error("key {key:?} of field {field} is outside the aggregation key domain")]
    UnknownKey { field: String, key: String },

    #[error("field {0} is not indexed as a key field")]
    NotAKeyField(String),

    #[error("unknown statistic: {0}")]
    UnknownStatistic(String),

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("aggregation cancelled")]
    Cancelled,
}

impl AggError {
    /// Whether the error reports a mismatch between the request and the store schema.
    ///
    /// Schema errors are programmer errors: the report is aborted and retrying cannot help.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownField(_)
                | Self::SchemaMismatch { .. }
                | Self::MissingValue { .. }
                | Self::RowLength { .. }
                | Self::Table(_)
                | Self::InvalidReference(_)
                | Self::UnknownKey { .. }
                | Self::NotAKeyField(_)
        )
    }
}
