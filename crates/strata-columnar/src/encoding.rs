#![forbid(unsafe_code)]

use crate::bitmap::BitVec;

/// One page of a column.
///
/// `validity` is `None` when every row in the page is non-null.
#[derive(Clone, Debug)]
pub(crate) enum EncodedChunk {
    Int(IntChunk),
    Float(FloatChunk),
    Bool(BoolChunk),
    Dict(DictionaryEncodedChunk),
}

impl EncodedChunk {
    pub fn len(&self) -> usize {
        match self {
            Self::Int(c) => c.offsets.len(),
            Self::Float(c) => c.values.len(),
            Self::Bool(c) => c.values.len(),
            Self::Dict(c) => c.indices.len(),
        }
    }
}

fn is_valid(validity: &Option<BitVec>, idx: usize) -> bool {
    validity.as_ref().map_or(true, |v| v.get(idx))
}

/// Integer page stored as offsets from the page minimum.
#[derive(Clone, Debug)]
pub(crate) struct IntChunk {
    pub min: i64,
    pub offsets: Vec<u64>,
    pub validity: Option<BitVec>,
}

impl IntChunk {
    pub fn encode(values: &[i64], validity: Option<BitVec>) -> Self {
        let min = values
            .iter()
            .enumerate()
            .filter(|(idx, _)| is_valid(&validity, *idx))
            .map(|(_, v)| *v)
            .min()
            .unwrap_or(0);
        let offsets = values
            .iter()
            .enumerate()
            .map(|(idx, v)| {
                if is_valid(&validity, idx) {
                    (*v as i128 - min as i128) as u64
                } else {
                    0
                }
            })
            .collect();
        Self {
            min,
            offsets,
            validity,
        }
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        if idx >= self.offsets.len() || !is_valid(&self.validity, idx) {
            return None;
        }
        Some((self.min as i128 + self.offsets[idx] as i128) as i64)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct FloatChunk {
    pub values: Vec<f64>,
    pub validity: Option<BitVec>,
}

impl FloatChunk {
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        if !is_valid(&self.validity, idx) {
            return None;
        }
        self.values.get(idx).copied()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct BoolChunk {
    pub values: BitVec,
    pub validity: Option<BitVec>,
}

impl BoolChunk {
    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        if idx >= self.values.len() || !is_valid(&self.validity, idx) {
            return None;
        }
        Some(self.values.get(idx))
    }
}

/// String page stored as indices into the column dictionary.
#[derive(Clone, Debug)]
pub(crate) struct DictionaryEncodedChunk {
    pub indices: Vec<u32>,
    pub validity: Option<BitVec>,
}

impl DictionaryEncodedChunk {
    pub fn get_index(&self, idx: usize) -> Option<u32> {
        if !is_valid(&self.validity, idx) {
            return None;
        }
        self.indices.get(idx).copied()
    }
}
