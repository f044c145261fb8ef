#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::encoding::{BoolChunk, DictionaryEncodedChunk, EncodedChunk, FloatChunk, IntChunk};
use crate::error::TableError;
use crate::types::{ColumnType, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    pub page_size_rows: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            page_size_rows: 65_536,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Column {
    schema: ColumnSchema,
    chunks: Vec<EncodedChunk>,
    dictionary: Option<Arc<Vec<Arc<str>>>>,
}

impl Column {
    fn chunk_index(&self, row: usize, page_size: usize) -> (usize, usize) {
        (row / page_size, row % page_size)
    }

    fn get_cell(&self, row: usize, page_size: usize) -> Value {
        let (chunk_idx, in_chunk) = self.chunk_index(row, page_size);
        let Some(chunk) = self.chunks.get(chunk_idx) else {
            return Value::Null;
        };

        match (chunk, &self.dictionary, self.schema.column_type) {
            (EncodedChunk::Int(c), _, ColumnType::DateTime) => c
                .get_i64(in_chunk)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            (EncodedChunk::Int(c), _, _) => c
                .get_i64(in_chunk)
                .map(Value::Integer)
                .unwrap_or(Value::Null),
            (EncodedChunk::Float(c), _, _) => c
                .get_f64(in_chunk)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            (EncodedChunk::Bool(c), _, _) => c
                .get_bool(in_chunk)
                .map(Value::Boolean)
                .unwrap_or(Value::Null),
            (EncodedChunk::Dict(c), Some(dict), _) => c
                .get_index(in_chunk)
                .map(|idx| Value::String(dict[idx as usize].clone()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// An immutable, paged columnar table.
///
/// Rows are addressed by their offset in insertion order; offsets stay valid for the lifetime of
/// the table.
#[derive(Clone, Debug)]
pub struct ColumnarTable {
    schema: Vec<ColumnSchema>,
    column_index: HashMap<String, usize>,
    columns: Vec<Column>,
    rows: usize,
    options: TableOptions,
}

impl ColumnarTable {
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn column_type(&self, col: usize) -> Option<ColumnType> {
        self.schema.get(col).map(|c| c.column_type)
    }

    /// Return the dictionary backing a string column.
    pub fn dictionary(&self, col: usize) -> Option<Arc<Vec<Arc<str>>>> {
        self.columns.get(col)?.dictionary.clone()
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Value {
        let Some(column) = self.columns.get(col) else {
            return Value::Null;
        };
        if row >= self.rows {
            return Value::Null;
        }
        column.get_cell(row, self.options.page_size_rows)
    }

    pub fn scan(&self) -> TableScan<'_> {
        TableScan { table: self }
    }
}

pub struct TableScan<'a> {
    table: &'a ColumnarTable,
}

impl<'a> TableScan<'a> {
    /// Dictionary code of every row of a string column (`None` for nulls), in row order.
    pub fn dictionary_codes(&self, col: usize) -> Option<Vec<Option<u32>>> {
        let column = self.table.columns.get(col)?;
        column.dictionary.as_ref()?;

        let mut out = Vec::with_capacity(self.table.rows);
        for chunk in &column.chunks {
            let EncodedChunk::Dict(c) = chunk else {
                continue;
            };
            for i in 0..c.indices.len() {
                out.push(c.get_index(i));
            }
        }
        Some(out)
    }
}

pub struct ColumnarTableBuilder {
    schema: Vec<ColumnSchema>,
    options: TableOptions,
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

enum ColumnBuilder {
    Int(IntBuilder),
    Float(FloatBuilder),
    Bool(BoolBuilder),
    Dict(DictBuilder),
}

impl ColumnBuilder {
    fn push(&mut self, value: &Value) {
        match self {
            Self::Int(b) => b.push(value),
            Self::Float(b) => b.push(value),
            Self::Bool(b) => b.push(value),
            Self::Dict(b) => b.push(value),
        }
    }

    fn flush(&mut self) {
        match self {
            Self::Int(b) => b.flush(),
            Self::Float(b) => b.flush(),
            Self::Bool(b) => b.flush(),
            Self::Dict(b) => b.flush(),
        }
    }

    fn finish(self) -> Column {
        match self {
            Self::Int(b) => b.finish(),
            Self::Float(b) => b.finish(),
            Self::Bool(b) => b.finish(),
            Self::Dict(b) => b.finish(),
        }
    }
}

fn take_validity(validity: &mut BitVec, page_size: usize) -> Option<BitVec> {
    let taken = std::mem::replace(validity, BitVec::with_capacity_bits(page_size));
    (!taken.all_true()).then_some(taken)
}

struct IntBuilder {
    schema: ColumnSchema,
    page_size: usize,
    current: Vec<i64>,
    validity: BitVec,
    chunks: Vec<EncodedChunk>,
}

struct FloatBuilder {
    schema: ColumnSchema,
    page_size: usize,
    current: Vec<f64>,
    validity: BitVec,
    chunks: Vec<EncodedChunk>,
}

struct BoolBuilder {
    schema: ColumnSchema,
    page_size: usize,
    current: BitVec,
    validity: BitVec,
    chunks: Vec<EncodedChunk>,
}

struct DictBuilder {
    schema: ColumnSchema,
    page_size: usize,
    dictionary: Vec<Arc<str>>,
    dict_map: HashMap<Arc<str>, u32>,
    current: Vec<u32>,
    validity: BitVec,
    chunks: Vec<EncodedChunk>,
}

impl ColumnarTableBuilder {
    pub fn new(schema: Vec<ColumnSchema>, options: TableOptions) -> Self {
        assert!(options.page_size_rows > 0, "page size must be non-zero");
        let builders = schema
            .iter()
            .cloned()
            .map(|col| match col.column_type {
                ColumnType::Number => {
                    ColumnBuilder::Float(FloatBuilder::new(col, options.page_size_rows))
                }
                ColumnType::String => {
                    ColumnBuilder::Dict(DictBuilder::new(col, options.page_size_rows))
                }
                ColumnType::Boolean => {
                    ColumnBuilder::Bool(BoolBuilder::new(col, options.page_size_rows))
                }
                ColumnType::Integer | ColumnType::DateTime => {
                    ColumnBuilder::Int(IntBuilder::new(col, options.page_size_rows))
                }
            })
            .collect();

        Self {
            schema,
            options,
            builders,
            rows: 0,
        }
    }

    /// Append one row.
    ///
    /// Nulls are accepted in every column. A non-null value of the wrong type rejects the whole
    /// row and leaves the table unchanged.
    pub fn append_row(&mut self, row: &[Value]) -> Result<(), TableError> {
        if row.len() != self.schema.len() {
            return Err(TableError::RowLength {
                expected: self.schema.len(),
                actual: row.len(),
            });
        }
        for (schema, value) in self.schema.iter().zip(row) {
            match value.column_type() {
                Some(actual) if actual != schema.column_type => {
                    return Err(TableError::SchemaMismatch {
                        column: schema.name.clone(),
                        expected: schema.column_type,
                        actual,
                    });
                }
                _ => {}
            }
        }

        for (builder, value) in self.builders.iter_mut().zip(row.iter()) {
            builder.push(value);
        }

        self.rows += 1;
        if self.rows % self.options.page_size_rows == 0 {
            for builder in &mut self.builders {
                builder.flush();
            }
        }
        Ok(())
    }

    pub fn finalize(self) -> ColumnarTable {
        let columns: Vec<Column> = self
            .builders
            .into_iter()
            .map(ColumnBuilder::finish)
            .collect();
        let column_index = self
            .schema
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();

        ColumnarTable {
            schema: self.schema,
            column_index,
            columns,
            rows: self.rows,
            options: self.options,
        }
    }
}

impl IntBuilder {
    fn new(schema: ColumnSchema, page_size: usize) -> Self {
        Self {
            schema,
            page_size,
            current: Vec::with_capacity(page_size),
            validity: BitVec::with_capacity_bits(page_size),
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, value: &Value) {
        let v = match (value, self.schema.column_type) {
            (Value::Integer(v), ColumnType::Integer) | (Value::DateTime(v), ColumnType::DateTime) => {
                Some(*v)
            }
            _ => None,
        };
        self.current.push(v.unwrap_or(0));
        self.validity.push(v.is_some());
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let validity = take_validity(&mut self.validity, self.page_size);
        self.chunks
            .push(EncodedChunk::Int(IntChunk::encode(&self.current, validity)));
        self.current.clear();
    }

    fn finish(mut self) -> Column {
        self.flush();
        Column {
            schema: self.schema,
            chunks: self.chunks,
            dictionary: None,
        }
    }
}

impl FloatBuilder {
    fn new(schema: ColumnSchema, page_size: usize) -> Self {
        Self {
            schema,
            page_size,
            current: Vec::with_capacity(page_size),
            validity: BitVec::with_capacity_bits(page_size),
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, value: &Value) {
        match value {
            Value::Number(v) => {
                self.current.push(*v);
                self.validity.push(true);
            }
            _ => {
                self.current.push(0.0);
                self.validity.push(false);
            }
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let validity = take_validity(&mut self.validity, self.page_size);
        self.chunks.push(EncodedChunk::Float(FloatChunk {
            values: std::mem::replace(&mut self.current, Vec::with_capacity(self.page_size)),
            validity,
        }));
    }

    fn finish(mut self) -> Column {
        self.flush();
        Column {
            schema: self.schema,
            chunks: self.chunks,
            dictionary: None,
        }
    }
}

impl BoolBuilder {
    fn new(schema: ColumnSchema, page_size: usize) -> Self {
        Self {
            schema,
            page_size,
            current: BitVec::with_capacity_bits(page_size),
            validity: BitVec::with_capacity_bits(page_size),
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, value: &Value) {
        match value {
            Value::Boolean(v) => {
                self.current.push(*v);
                self.validity.push(true);
            }
            _ => {
                self.current.push(false);
                self.validity.push(false);
            }
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let validity = take_validity(&mut self.validity, self.page_size);
        self.chunks.push(EncodedChunk::Bool(BoolChunk {
            values: std::mem::replace(
                &mut self.current,
                BitVec::with_capacity_bits(self.page_size),
            ),
            validity,
        }));
    }

    fn finish(mut self) -> Column {
        self.flush();
        Column {
            schema: self.schema,
            chunks: self.chunks,
            dictionary: None,
        }
    }
}

impl DictBuilder {
    fn new(schema: ColumnSchema, page_size: usize) -> Self {
        Self {
            schema,
            page_size,
            dictionary: Vec::new(),
            dict_map: HashMap::new(),
            current: Vec::with_capacity(page_size),
            validity: BitVec::with_capacity_bits(page_size),
            chunks: Vec::new(),
        }
    }

    fn intern(&mut self, s: &Arc<str>) -> u32 {
        if let Some(idx) = self.dict_map.get(s.as_ref()) {
            return *idx;
        }

        let idx = self.dictionary.len() as u32;
        self.dictionary.push(s.clone());
        self.dict_map.insert(s.clone(), idx);
        idx
    }

    fn push(&mut self, value: &Value) {
        match value {
            Value::String(s) => {
                let idx = self.intern(s);
                self.current.push(idx);
                self.validity.push(true);
            }
            _ => {
                self.current.push(0);
                self.validity.push(false);
            }
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let validity = take_validity(&mut self.validity, self.page_size);
        self.chunks
            .push(EncodedChunk::Dict(DictionaryEncodedChunk {
                indices: std::mem::replace(
                    &mut self.current,
                    Vec::with_capacity(self.page_size),
                ),
                validity,
            }));
    }

    fn finish(mut self) -> Column {
        self.flush();
        Column {
            schema: self.schema,
            chunks: self.chunks,
            dictionary: Some(Arc::new(self.dictionary)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_datetime_pages_roundtrip() {
        let schema = vec![
            ColumnSchema::new("id", ColumnType::Integer),
            ColumnSchema::new("hired", ColumnType::DateTime),
        ];
        let options = TableOptions {
            page_size_rows: 128,
        };

        let mut builder = ColumnarTableBuilder::new(schema, options);
        for i in 0..1000 {
            builder
                .append_row(&[Value::Integer(i), Value::DateTime(i * 86_400)])
                .unwrap();
        }
        let table = builder.finalize();

        assert_eq!(table.row_count(), 1000);
        assert_eq!(table.get_cell(0, 0), Value::Integer(0));
        assert_eq!(table.get_cell(999, 0), Value::Integer(999));
        assert_eq!(table.get_cell(999, 1), Value::DateTime(999 * 86_400));
        assert_eq!(table.get_cell(1000, 0), Value::Null);
        assert_eq!(table.get_cell(0, 2), Value::Null);
    }

    #[test]
    fn mistyped_rows_are_rejected_whole() {
        let schema = vec![
            ColumnSchema::new("x", ColumnType::Number),
            ColumnSchema::new("hired", ColumnType::DateTime),
        ];
        let mut builder = ColumnarTableBuilder::new(schema, TableOptions { page_size_rows: 4 });
        builder
            .append_row(&[Value::Number(1.5), Value::Null])
            .unwrap();

        assert_eq!(
            builder.append_row(&[Value::Number(2.5), Value::Integer(86_400)]),
            Err(TableError::SchemaMismatch {
                column: "hired".to_string(),
                expected: ColumnType::DateTime,
                actual: ColumnType::Integer,
            })
        );
        assert_eq!(
            builder.append_row(&[Value::Number(2.5)]),
            Err(TableError::RowLength {
                expected: 2,
                actual: 1
            })
        );

        let table = builder.finalize();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.get_cell(0, 0), Value::Number(1.5));
        assert_eq!(table.get_cell(0, 1), Value::Null);
        assert_eq!(table.get_cell(1, 0), Value::Null);
    }

    #[test]
    fn dictionary_codes_follow_first_appearance() {
        let schema = vec![
            ColumnSchema::new("x", ColumnType::Number),
            ColumnSchema::new("cat", ColumnType::String),
        ];
        let mut builder = ColumnarTableBuilder::new(schema, TableOptions { page_size_rows: 3 });
        for cat in [Value::from("B"), Value::from("A"), Value::Null, Value::from("B")] {
            builder.append_row(&[Value::Number(0.0), cat]).unwrap();
        }
        let table = builder.finalize();

        assert_eq!(
            table.scan().dictionary_codes(1),
            Some(vec![Some(0), Some(1), None, Some(0)])
        );
        assert_eq!(table.scan().dictionary_codes(0), None);
        assert_eq!(table.dictionary(1).unwrap().len(), 2);
    }
}
