use crate::error::{AggError, AggResult};
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use strata_columnar::{ColumnSchema, ColumnType, ColumnarTable, DictionaryIndex, Order, Value};

/// Opaque handle to one record of a [`RecordStore`].
///
/// The engine never interprets the handle; it only passes it back to the store that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef(u64);

impl RecordRef {
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub const fn offset(self) -> u64 {
        self.0
    }

    /// Row position, or `None` when the offset does not fit the target's `usize`.
    fn row(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a field in a store's schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldId(pub usize);

/// A discrete group key value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyValue(Arc<str>);

impl KeyValue {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Rust types a store field can be deserialized into.
pub trait FieldType: Sized {
    /// Human readable type name used in schema errors.
    const NAME: &'static str;

    fn accepts(column_type: ColumnType) -> bool;

    /// Convert a non-null cell. Returns `None` for nulls.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FieldType for i64 {
    const NAME: &'static str = "i64";

    fn accepts(column_type: ColumnType) -> bool {
        matches!(column_type, ColumnType::Integer | ColumnType::DateTime)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(v) | Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldType for f64 {
    const NAME: &'static str = "f64";

    fn accepts(column_type: ColumnType) -> bool {
        column_type == ColumnType::Number
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldType for bool {
    const NAME: &'static str = "bool";

    fn accepts(column_type: ColumnType) -> bool {
        column_type == ColumnType::Boolean
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldType for KeyValue {
    const NAME: &'static str = "key";

    fn accepts(column_type: ColumnType) -> bool {
        column_type == ColumnType::String
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            _ => None,
        }
    }
}

/// Read access to the records being aggregated.
///
/// Stores are shared read-only between workers for the duration of a report.
pub trait RecordStore: fmt::Debug + Send + Sync {
    fn fields(&self) -> &[ColumnSchema];

    fn record_count(&self) -> usize;

    /// The raw cell for `field` of `reference`, or `None` if either handle is invalid.
    fn value(&self, reference: RecordRef, field: FieldId) -> Option<Value>;

    fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields()
            .iter()
            .position(|f| f.name == name)
            .map(FieldId)
    }

    fn resolve_field(&self, name: &str) -> AggResult<FieldId> {
        self.field_id(name)
            .ok_or_else(|| AggError::UnknownField(name.to_string()))
    }

    fn field_schema(&self, field: FieldId) -> AggResult<&ColumnSchema> {
        self.fields()
            .get(field.0)
            .ok_or_else(|| AggError::UnknownField(format!("#{}", field.0)))
    }

    /// Every reference in the store, in store order.
    fn references(&self) -> Vec<RecordRef> {
        (0..self.record_count() as u64).map(RecordRef).collect()
    }

    /// Typed read of one field.
    ///
    /// Fails with [`AggError::SchemaMismatch`] if the field type cannot be read as `T`, and with
    /// [`AggError::MissingValue`] if the cell is null.
    fn deserialize<T: FieldType>(&self, reference: RecordRef, field: FieldId) -> AggResult<T>
    where
        Self: Sized,
    {
        let schema = self.field_schema(field)?;
        if !T::accepts(schema.column_type) {
            return Err(AggError::SchemaMismatch {
                field: schema.name.clone(),
                expected: T::NAME.to_string(),
                actual: schema.column_type,
            });
        }
        let value = self
            .value(reference, field)
            .ok_or(AggError::InvalidReference(reference))?;
        T::from_value(&value).ok_or_else(|| AggError::MissingValue {
            field: schema.name.clone(),
            reference,
        })
    }
}

/// Equality lookups on discrete key fields.
pub trait KeyIndex: RecordStore {
    /// Distinct non-null values of `field`, sorted ascending.
    fn key_domain(&self, field: FieldId) -> AggResult<Vec<KeyValue>>;

    /// References whose `field` equals `key`, in `order`, paginated by `offset`/`limit`.
    fn equal(
        &self,
        field: FieldId,
        key: &KeyValue,
        order: Order,
        offset: usize,
        limit: usize,
    ) -> AggResult<Vec<RecordRef>>;
}

fn key_field_schema<S: RecordStore + ?Sized>(store: &S, field: FieldId) -> AggResult<&ColumnSchema> {
    let schema = store.field_schema(field)?;
    if schema.column_type != ColumnType::String {
        return Err(AggError::NotAKeyField(schema.name.clone()));
    }
    Ok(schema)
}

/// Row-major store for small tables and tests.
///
/// Key lookups scan every row.
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    fields: Vec<ColumnSchema>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl InMemoryStore {
    pub fn new(fields: Vec<ColumnSchema>) -> Self {
        let column_index = fields
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();

        Self {
            fields,
            column_index,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> AggResult<RecordRef> {
        if row.len() != self.fields.len() {
            return Err(AggError::RowLength {
                expected: self.fields.len(),
                actual: row.len(),
            });
        }
        for (schema, value) in self.fields.iter().zip(&row) {
            if let Some(actual) = value.column_type() {
                if actual != schema.column_type {
                    return Err(AggError::SchemaMismatch {
                        field: schema.name.clone(),
                        expected: schema.column_type.to_string(),
                        actual,
                    });
                }
            }
        }

        let reference = RecordRef(self.rows.len() as u64);
        self.rows.push(row);
        Ok(reference)
    }
}

impl RecordStore for InMemoryStore {
    fn fields(&self) -> &[ColumnSchema] {
        &self.fields
    }

    fn record_count(&self) -> usize {
        self.rows.len()
    }

    fn value(&self, reference: RecordRef, field: FieldId) -> Option<Value> {
        self.rows.get(reference.row()?)?.get(field.0).cloned()
    }

    fn field_id(&self, name: &str) -> Option<FieldId> {
        self.column_index.get(name).copied().map(FieldId)
    }
}

impl KeyIndex for InMemoryStore {
    fn key_domain(&self, field: FieldId) -> AggResult<Vec<KeyValue>> {
        key_field_schema(self, field)?;
        let distinct: BTreeSet<KeyValue> = self
            .rows
            .iter()
            .filter_map(|row| KeyValue::from_value(&row[field.0]))
            .collect();
        Ok(distinct.into_iter().collect())
    }

    fn equal(
        &self,
        field: FieldId,
        key: &KeyValue,
        order: Order,
        offset: usize,
        limit: usize,
    ) -> AggResult<Vec<RecordRef>> {
        key_field_schema(self, field)?;
        let matches = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches!(&row[field.0], Value::String(s) if s.as_ref() == key.as_str()))
            .map(|(idx, _)| RecordRef(idx as u64));

        Ok(match order {
            Order::Ascending => matches.skip(offset).take(limit).collect(),
            Order::Descending => {
                let mut all: Vec<RecordRef> = matches.collect();
                all.reverse();
                all.into_iter().skip(offset).take(limit).collect()
            }
        })
    }
}

/// Store backed by a [`ColumnarTable`], with a [`DictionaryIndex`] for every string column.
#[derive(Clone)]
pub struct ColumnarStore {
    table: Arc<ColumnarTable>,
    indexes: HashMap<usize, DictionaryIndex>,
}

impl fmt::Debug for ColumnarStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnarStore")
            .field("fields", &self.table.schema())
            .field("rows", &self.table.row_count())
            .finish()
    }
}

impl ColumnarStore {
    pub fn new(table: ColumnarTable) -> Self {
        Self::from_arc(Arc::new(table))
    }

    pub fn from_arc(table: Arc<ColumnarTable>) -> Self {
        let indexes = (0..table.column_count())
            .filter_map(|col| DictionaryIndex::build(&table, col).map(|index| (col, index)))
            .collect();
        Self { table, indexes }
    }

    pub fn table(&self) -> &ColumnarTable {
        &self.table
    }

    fn index(&self, field: FieldId) -> AggResult<&DictionaryIndex> {
        key_field_schema(self, field)?;
        self.indexes
            .get(&field.0)
            .ok_or_else(|| AggError::NotAKeyField(self.table.schema()[field.0].name.clone()))
    }
}

impl RecordStore for ColumnarStore {
    fn fields(&self) -> &[ColumnSchema] {
        self.table.schema()
    }

    fn record_count(&self) -> usize {
        self.table.row_count()
    }

    fn value(&self, reference: RecordRef, field: FieldId) -> Option<Value> {
        let row = reference.row()?;
        if row >= self.table.row_count() || field.0 >= self.table.column_count() {
            return None;
        }
        Some(self.table.get_cell(row, field.0))
    }

    fn field_id(&self, name: &str) -> Option<FieldId> {
        self.table.column_index(name).map(FieldId)
    }
}

impl KeyIndex for ColumnarStore {
    fn key_domain(&self, field: FieldId) -> AggResult<Vec<KeyValue>> {
        let index = self.index(field)?;
        let mut values: Vec<KeyValue> = index
            .values()
            .iter()
            .cloned()
            .map(KeyValue)
            .collect();
        values.sort();
        Ok(values)
    }

    fn equal(
        &self,
        field: FieldId,
        key: &KeyValue,
        order: Order,
        offset: usize,
        limit: usize,
    ) -> AggResult<Vec<RecordRef>> {
        let index = self.index(field)?;
        Ok(index
            .equal(key.as_str(), order, offset, limit)
            .into_iter()
            .map(|row| RecordRef(row as u64))
            .collect())
    }
}
