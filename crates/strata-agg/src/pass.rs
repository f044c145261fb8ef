use crate::accumulator::{Accumulator, StatSpec};
use crate::config::PipelineOptions;
use crate::error::{AggError, AggResult};
use crate::extractor::BoundExtractor;
use crate::parallel;
use crate::report::GroupResult;
use crate::store::{FieldId, KeyIndex, KeyValue, RecordRef, RecordStore};
use std::collections::HashMap;
use strata_columnar::ColumnType;

/// The ordered set of key values a pass reports on.
///
/// Every value in the domain gets a result row, including values no record carries.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyDomain {
    values: Vec<KeyValue>,
    ordinals: HashMap<KeyValue, usize>,
}

impl KeyDomain {
    /// A domain in the given order. Repeated values keep their first position.
    pub fn new<K: Into<KeyValue>>(values: impl IntoIterator<Item = K>) -> Self {
        let mut domain = Self {
            values: Vec::new(),
            ordinals: HashMap::new(),
        };
        for value in values {
            let value = value.into();
            if !domain.ordinals.contains_key(&value) {
                domain.ordinals.insert(value.clone(), domain.values.len());
                domain.values.push(value);
            }
        }
        domain
    }

    pub fn values(&self) -> &[KeyValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ordinal(&self, key: &KeyValue) -> Option<usize> {
        self.ordinals.get(key).copied()
    }
}

/// The discrete field a pass groups by.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyField {
    pub field: String,
    /// Explicit domain. When absent the domain is every distinct value in the store's key index,
    /// sorted ascending.
    pub domain: Option<KeyDomain>,
}

impl KeyField {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            domain: None,
        }
    }

    pub fn with_domain<K: Into<KeyValue>>(mut self, values: impl IntoIterator<Item = K>) -> Self {
        self.domain = Some(KeyDomain::new(values));
        self
    }

    pub(crate) fn resolve<S: KeyIndex>(&self, store: &S) -> AggResult<(FieldId, KeyDomain)> {
        let field = store.resolve_field(&self.field)?;
        let column_type = store.field_schema(field)?.column_type;
        if column_type != ColumnType::String {
            return Err(AggError::NotAKeyField(self.field.clone()));
        }
        let domain = match &self.domain {
            Some(domain) => domain.clone(),
            None => KeyDomain::new(store.key_domain(field)?),
        };
        Ok((field, domain))
    }
}

/// Statistics with their extractors bound to one store.
#[derive(Debug)]
struct BoundStats {
    names: Vec<String>,
    extractors: Vec<Option<BoundExtractor>>,
    identities: Vec<Accumulator>,
}

impl BoundStats {
    fn bind<S: RecordStore>(stats: &[StatSpec], store: &S) -> AggResult<Self> {
        let mut names: Vec<String> = Vec::with_capacity(stats.len());
        let mut extractors = Vec::with_capacity(stats.len());
        let mut identities = Vec::with_capacity(stats.len());
        for spec in stats {
            if names.contains(&spec.name) {
                return Err(AggError::InvalidPipeline(format!(
                    "statistic {} is defined twice in one pass",
                    spec.name
                )));
            }
            names.push(spec.name.clone());
            extractors.push(
                spec.statistic
                    .extractor()
                    .map(|e| e.fold_constants().bind(store))
                    .transpose()?,
            );
            identities.push(spec.statistic.identity());
        }
        Ok(Self {
            names,
            extractors,
            identities,
        })
    }

    fn identity(&self) -> GroupFold {
        GroupFold {
            count: Accumulator::count(),
            stats: self.identities.clone(),
        }
    }

    fn fold_record<S: RecordStore>(
        &self,
        store: &S,
        state: GroupFold,
        reference: RecordRef,
    ) -> AggResult<GroupFold> {
        let GroupFold { count, mut stats } = state;
        for (acc, extractor) in stats.iter_mut().zip(&self.extractors) {
            let x = match extractor {
                Some(extractor) => extractor.evaluate_f64(store, reference)?,
                None => 0.0,
            };
            *acc = acc.fold(x);
        }
        Ok(GroupFold {
            count: count.fold(0.0),
            stats,
        })
    }

    fn finish(&self, key: KeyValue, state: &GroupFold) -> GroupResult {
        let group = GroupResult::new(key, state.count.folded());
        self.names
            .iter()
            .zip(&state.stats)
            .fold(group, |group, (name, acc)| group.with_stat(name.clone(), acc.finalize()))
    }
}

/// Partial fold of one group: the record count plus one accumulator per statistic.
#[derive(Clone, Debug)]
struct GroupFold {
    count: Accumulator,
    stats: Vec<Accumulator>,
}

impl Default for GroupFold {
    fn default() -> Self {
        Self {
            count: Accumulator::count(),
            stats: Vec::new(),
        }
    }
}

impl GroupFold {
    fn merge(self, other: GroupFold) -> GroupFold {
        GroupFold {
            count: self.count.merge(other.count),
            stats: self
                .stats
                .into_iter()
                .zip(other.stats)
                .map(|(a, b)| a.merge(b))
                .collect(),
        }
    }
}

/// One scan over a set of references, partitioned by a key field.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationPass {
    pub key: KeyField,
    pub stats: Vec<StatSpec>,
}

impl AggregationPass {
    pub fn new(key: KeyField, stats: Vec<StatSpec>) -> Self {
        Self { key, stats }
    }

    /// Fold every reference into the group of its key value.
    ///
    /// Returns one result per key in domain order. Records whose key is null or outside an
    /// explicit domain fail the pass with [`AggError::MissingValue`] / [`AggError::UnknownKey`].
    ///
    /// References are folded in chunks of [`PipelineOptions::chunk_rows`], and partial states are
    /// merged in chunk order, so the result depends only on the order of `references`.
    pub fn aggregate<S: KeyIndex>(
        &self,
        store: &S,
        references: &[RecordRef],
        options: &PipelineOptions,
    ) -> AggResult<Vec<GroupResult>> {
        let (key_field, domain) = self.key.resolve(store)?;
        let bound = BoundStats::bind(&self.stats, store)?;
        log::debug!(
            "aggregating {} references by {} into {} groups ({} statistics, {:?})",
            references.len(),
            self.key.field,
            domain.len(),
            self.stats.len(),
            options.execution,
        );

        let fold_chunk = |chunk: &&[RecordRef]| -> AggResult<Vec<GroupFold>> {
            let mut states = vec![bound.identity(); domain.len()];
            for &reference in *chunk {
                let key = store.deserialize::<KeyValue>(reference, key_field)?;
                let ordinal = domain.ordinal(&key).ok_or_else(|| AggError::UnknownKey {
                    field: self.key.field.clone(),
                    key: key.to_string(),
                })?;
                let state = std::mem::take(&mut states[ordinal]);
                states[ordinal] = bound.fold_record(store, state, reference)?;
            }
            Ok(states)
        };

        let chunks: Vec<&[RecordRef]> = references.chunks(options.chunk_rows.max(1)).collect();
        let partials = parallel::map_ordered(&chunks, options.execution, fold_chunk);

        let mut states = vec![bound.identity(); domain.len()];
        for partial in partials {
            states = states
                .into_iter()
                .zip(partial?)
                .map(|(acc, part)| acc.merge(part))
                .collect();
        }

        let mut groups = Vec::with_capacity(domain.len());
        for (key, state) in domain.values().iter().zip(&states) {
            let group = bound.finish(key.clone(), state);
            if group.is_empty() && options.skip_empty_groups {
                log::debug!("skipping empty group {key}");
                continue;
            }
            groups.push(group);
        }
        Ok(groups)
    }

    /// Fold `references` as a single group without reading the key field.
    ///
    /// Used by dependent passes, whose references already come from a key lookup.
    pub fn fold_group<S: RecordStore>(
        &self,
        store: &S,
        key: &KeyValue,
        references: &[RecordRef],
    ) -> AggResult<GroupResult> {
        let bound = BoundStats::bind(&self.stats, store)?;
        let state = references
            .iter()
            .try_fold(bound.identity(), |state, &reference| {
                bound.fold_record(store, state, reference)
            })?;
        log::trace!(
            "folded {} references of group {key} ({} statistics)",
            references.len(),
            self.stats.len()
        );
        Ok(bound.finish(key.clone(), &state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionMode;
    use crate::extractor::Extractor;
    use crate::store::InMemoryStore;
    use pretty_assertions::assert_eq;
    use strata_columnar::{ColumnSchema, Value};

    fn store(rows: &[(&str, i64)]) -> InMemoryStore {
        let mut store = InMemoryStore::new(vec![
            ColumnSchema::new("group", ColumnType::String),
            ColumnSchema::new("x", ColumnType::Integer),
        ]);
        for &(key, x) in rows {
            store
                .push_row(vec![Value::from(key), Value::Integer(x)])
                .unwrap();
        }
        store
    }

    fn means_pass(key: KeyField) -> AggregationPass {
        AggregationPass::new(
            key,
            vec![
                StatSpec::count("n"),
                StatSpec::average("x.mean", Extractor::field("x")),
            ],
        )
    }

    #[test]
    fn groups_follow_the_key_domain() {
        let store = store(&[("b", 1), ("a", 2), ("b", 3)]);
        let pass = means_pass(KeyField::new("group"));
        let groups = pass
            .aggregate(&store, &store.references(), &PipelineOptions::sequential())
            .unwrap();

        assert_eq!(
            groups,
            vec![
                GroupResult::new("a".into(), 1)
                    .with_stat("n", 1.0)
                    .with_stat("x.mean", 2.0),
                GroupResult::new("b".into(), 2)
                    .with_stat("n", 2.0)
                    .with_stat("x.mean", 2.0),
            ]
        );
    }

    #[test]
    fn explicit_domain_reports_absent_keys() {
        let store = store(&[("b", 1)]);
        let pass = means_pass(KeyField::new("group").with_domain(["c", "b"]));
        let groups = pass
            .aggregate(&store, &store.references(), &PipelineOptions::sequential())
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.as_str(), "c");
        assert_eq!(groups[0].count, 0);
        assert_eq!(groups[0].get("n"), Some(0.0));
        assert!(groups[0].get("x.mean").unwrap().is_nan());
        assert_eq!(groups[1].get("x.mean"), Some(1.0));

        let skipping = PipelineOptions {
            skip_empty_groups: true,
            ..PipelineOptions::sequential()
        };
        let groups = pass
            .aggregate(&store, &store.references(), &skipping)
            .unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn keys_outside_an_explicit_domain_fail() {
        let store = store(&[("a", 1), ("z", 2)]);
        let pass = means_pass(KeyField::new("group").with_domain(["a"]));
        let err = pass
            .aggregate(&store, &store.references(), &PipelineOptions::sequential())
            .unwrap_err();
        assert_eq!(
            err,
            AggError::UnknownKey {
                field: "group".to_string(),
                key: "z".to_string(),
            }
        );
    }

    #[test]
    fn grouping_by_a_numeric_field_is_rejected() {
        let store = store(&[("a", 1)]);
        let err = means_pass(KeyField::new("x"))
            .aggregate(&store, &store.references(), &PipelineOptions::default())
            .unwrap_err();
        assert_eq!(err, AggError::NotAKeyField("x".to_string()));
    }

    #[test]
    fn duplicate_statistic_names_are_rejected() {
        let store = store(&[("a", 1)]);
        let pass = AggregationPass::new(
            KeyField::new("group"),
            vec![StatSpec::count("n"), StatSpec::count("n")],
        );
        let err = pass
            .aggregate(&store, &store.references(), &PipelineOptions::default())
            .unwrap_err();
        assert!(matches!(err, AggError::InvalidPipeline(_)));
    }

    #[test]
    fn chunked_parallel_fold_matches_sequential() {
        let rows: Vec<(&str, i64)> = (0..500)
            .map(|i| (if i % 3 == 0 { "a" } else { "b" }, i * 7 % 101))
            .collect();
        let store = store(&rows);
        let pass = means_pass(KeyField::new("group"));
        let refs = store.references();

        let sequential = PipelineOptions {
            chunk_rows: 64,
            ..PipelineOptions::sequential()
        };
        let parallel = PipelineOptions {
            execution: ExecutionMode::Parallel,
            ..sequential.clone()
        };
        assert_eq!(
            pass.aggregate(&store, &refs, &sequential).unwrap(),
            pass.aggregate(&store, &refs, &parallel).unwrap()
        );
    }

    #[test]
    fn fold_group_ignores_the_key_field() {
        let store = store(&[("a", 4), ("b", 8)]);
        let pass = means_pass(KeyField::new("group"));
        let group = pass
            .fold_group(&store, &"all".into(), &store.references())
            .unwrap();
        assert_eq!(group.count, 2);
        assert_eq!(group.get("x.mean"), Some(6.0));
    }
}
