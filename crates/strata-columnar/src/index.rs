#![forbid(unsafe_code)]

use crate::table::ColumnarTable;
use std::sync::Arc;

/// Row order for index lookups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Bucketed equality index over a dictionary-encoded string column.
///
/// Every dictionary code owns the ascending list of rows holding it, so an equality lookup is a
/// bucket slice instead of a column scan. Null rows are not indexed.
#[derive(Clone, Debug)]
pub struct DictionaryIndex {
    dictionary: Arc<Vec<Arc<str>>>,
    buckets: Vec<Vec<usize>>,
}

impl DictionaryIndex {
    /// Build the index for `col`, or `None` when the column is not dictionary encoded.
    pub fn build(table: &ColumnarTable, col: usize) -> Option<Self> {
        let dictionary = table.dictionary(col)?;
        let codes = table.scan().dictionary_codes(col)?;

        let mut buckets = vec![Vec::new(); dictionary.len()];
        for (row, code) in codes.into_iter().enumerate() {
            if let Some(code) = code {
                buckets[code as usize].push(row);
            }
        }

        Some(Self {
            dictionary,
            buckets,
        })
    }

    /// Distinct non-null values, in dictionary (first appearance) order.
    pub fn values(&self) -> &[Arc<str>] {
        &self.dictionary
    }

    pub fn code(&self, value: &str) -> Option<u32> {
        self.dictionary
            .iter()
            .position(|s| s.as_ref() == value)
            .map(|idx| idx as u32)
    }

    /// Rows where the column equals `value`, in `order`, skipping `offset` rows and returning at
    /// most `limit` rows.
    pub fn equal(&self, value: &str, order: Order, offset: usize, limit: usize) -> Vec<usize> {
        let Some(code) = self.code(value) else {
            return Vec::new();
        };
        let bucket = &self.buckets[code as usize];
        match order {
            Order::Ascending => bucket.iter().skip(offset).take(limit).copied().collect(),
            Order::Descending => bucket
                .iter()
                .rev()
                .skip(offset)
                .take(limit)
                .copied()
                .collect(),
        }
    }
}
