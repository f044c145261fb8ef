use crate::store::KeyValue;
use serde::ser::Serializer;
use serde::Serialize;

/// Named statistics of one group.
///
/// `count` is the number of records the group's first pass folded. Statistics keep the order in
/// which passes and projections produced them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupResult {
    pub key: KeyValue,
    pub count: u64,
    #[serde(serialize_with = "serialize_stats")]
    pub stats: Vec<(String, f64)>,
}

fn serialize_stats<S: Serializer>(stats: &[(String, f64)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(stats.iter().map(|(name, value)| (name, value)))
}

impl GroupResult {
    pub fn new(key: KeyValue, count: u64) -> Self {
        Self {
            key,
            count,
            stats: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.stats
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    /// Adds or replaces one statistic.
    #[must_use]
    pub fn with_stat(mut self, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        match self.stats.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.stats.push((name, value)),
        }
        self
    }

    /// Adds the statistics of a later pass over the same group. The count of `self` is kept.
    #[must_use]
    pub fn extend(self, later: GroupResult) -> Self {
        debug_assert_eq!(self.key, later.key);
        later
            .stats
            .into_iter()
            .fold(self, |group, (name, value)| group.with_stat(name, value))
    }
}

/// Finished output of a pipeline: one entry per group, in key-domain order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report {
    pub groups: Vec<GroupResult>,
}

impl Report {
    pub fn new(groups: Vec<GroupResult>) -> Self {
        Self { groups }
    }

    pub fn group(&self, key: &str) -> Option<&GroupResult> {
        self.groups.iter().find(|g| g.key.as_str() == key)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl IntoIterator for Report {
    type Item = GroupResult;
    type IntoIter = std::vec::IntoIter<GroupResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}
