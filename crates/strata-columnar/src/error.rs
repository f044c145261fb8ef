use crate::types::ColumnType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("row has {actual} values, schema has {expected} columns")]
    RowLength { expected: usize, actual: usize },

    #[error("column {column} holds {expected} values, got {actual}")]
    SchemaMismatch {
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },
}
