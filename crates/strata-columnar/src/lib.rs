//! Columnar record storage for Strata.
//!
//! This crate focuses on:
//! - Columnar data representation (dictionary-encoded strings, integer and float pages, validity bitmaps).
//! - Streaming ingestion (build pages incrementally; never materialize a row-major grid), rejecting
//!   cells whose type does not match their column.
//! - Total cell access (`get_cell`) addressed by row offset.
//! - Bucketed dictionary indexes so equality lookups on a key column never rescan the table.

#![forbid(unsafe_code)]

mod bitmap;
mod encoding;
mod error;
mod index;
mod table;
mod types;

pub use crate::bitmap::BitVec;
pub use crate::error::TableError;
pub use crate::index::{DictionaryIndex, Order};
pub use crate::table::{ColumnSchema, ColumnarTable, ColumnarTableBuilder, TableOptions, TableScan};
pub use crate::types::{ColumnType, Value};
