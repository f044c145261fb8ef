use crate::accumulator::StatSpec;
use crate::cancel::CancellationToken;
use crate::config::PipelineOptions;
use crate::error::{AggError, AggResult};
use crate::parallel;
use crate::pass::{AggregationPass, KeyField};
use crate::projection::Projection;
use crate::report::{GroupResult, Report};
use crate::store::KeyIndex;
use std::fmt;
use strata_columnar::Order;

/// Builds the statistics of a dependent pass from the group's earlier results.
///
/// The returned specs typically capture earlier means as constants, e.g. a variance around the
/// group mean computed by the first pass.
pub type GroupStats<'a> = Box<dyn Fn(&GroupResult) -> Vec<StatSpec> + Send + Sync + 'a>;

pub enum Stage<'a> {
    /// Fold every reference of the store. Only valid as the first stage.
    Scan(AggregationPass),
    /// Fold each group again with statistics derived from its current result.
    PerGroup(GroupStats<'a>),
    Project(Vec<Projection>),
}

impl Stage<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Scan(_) => "scan",
            Self::PerGroup(_) => "per-group",
            Self::Project(_) => "project",
        }
    }
}

impl fmt::Debug for Stage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan(pass) => f.debug_tuple("Scan").field(pass).finish(),
            Self::PerGroup(_) => f.write_str("PerGroup(..)"),
            Self::Project(projections) => f.debug_tuple("Project").field(projections).finish(),
        }
    }
}

/// Runs passes and projections over one store.
#[derive(Debug)]
pub struct Pipeline<'s, S> {
    store: &'s S,
    options: PipelineOptions,
    cancellation: Option<CancellationToken>,
}

impl<'s, S: KeyIndex> Pipeline<'s, S> {
    pub fn new(store: &'s S, options: PipelineOptions) -> Self {
        Self {
            store,
            options,
            cancellation: None,
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn checkpoint(&self) -> AggResult<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(AggError::Cancelled),
            _ => Ok(()),
        }
    }

    /// First pass over every reference of the store.
    pub fn scan(&self, pass: &AggregationPass) -> AggResult<Vec<GroupResult>> {
        self.checkpoint()?;
        let references = self.store.references();
        pass.aggregate(self.store, &references, &self.options)
    }

    /// Dependent pass: refold each prior group's records with the statistics `stats_for` builds
    /// from that group.
    ///
    /// Each result keeps the prior group's count and fields and gains the new ones. Groups are
    /// independent; output order is the order of `prior`.
    pub fn per_group<F>(
        &self,
        key_field: &str,
        prior: &[GroupResult],
        stats_for: F,
    ) -> AggResult<Vec<GroupResult>>
    where
        F: Fn(&GroupResult) -> Vec<StatSpec> + Send + Sync,
    {
        let field = self.store.resolve_field(key_field)?;
        let key = KeyField::new(key_field);

        let results = parallel::map_ordered(
            prior,
            self.options.execution,
            |group| -> AggResult<GroupResult> {
                self.checkpoint()?;
                let references =
                    self.store
                        .equal(field, &group.key, Order::Ascending, 0, usize::MAX)?;
                let pass = AggregationPass::new(key.clone(), stats_for(group));
                let later = pass.fold_group(self.store, &group.key, &references)?;
                Ok(group.clone().extend(later))
            },
        );
        results.into_iter().collect()
    }

    pub fn project(
        &self,
        groups: Vec<GroupResult>,
        projections: &[Projection],
    ) -> AggResult<Vec<GroupResult>> {
        groups
            .into_iter()
            .map(|group| {
                projections
                    .iter()
                    .try_fold(group, |group, projection| projection.apply(group))
            })
            .collect()
    }

    /// Run `stages` in order. The first stage must be a [`Stage::Scan`], and no later stage may be.
    pub fn run(&self, stages: &[Stage<'_>]) -> AggResult<Report> {
        let Some((Stage::Scan(pass), rest)) = stages.split_first() else {
            return Err(AggError::InvalidPipeline(
                "a pipeline must start with a scan stage".to_string(),
            ));
        };
        if let Some(position) = rest.iter().position(|s| matches!(s, Stage::Scan(_))) {
            return Err(AggError::InvalidPipeline(format!(
                "stage {} is a scan; only the first stage may scan",
                position + 1
            )));
        }

        log::debug!("running {}-stage pipeline keyed by {}", stages.len(), pass.key.field);
        let mut groups = self.scan(pass)?;
        for stage in rest {
            self.checkpoint()?;
            log::debug!("{} stage over {} groups", stage.name(), groups.len());
            groups = match stage {
                Stage::Scan(_) => unreachable!("validated above"),
                Stage::PerGroup(stats_for) => {
                    self.per_group(&pass.key.field, &groups, |group| stats_for(group))?
                }
                Stage::Project(projections) => self.project(groups, projections)?,
            };
        }

        for group in groups.iter().filter(|g| g.is_empty()) {
            log::warn!("group {} of {} has no records", group.key, pass.key.field);
        }
        Ok(Report::new(groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Extractor;
    use crate::store::InMemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_columnar::{ColumnSchema, ColumnType, Value};

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new(vec![
            ColumnSchema::new("g", ColumnType::String),
            ColumnSchema::new("x", ColumnType::Integer),
        ]);
        for (g, x) in [("a", 1), ("a", 3), ("b", 10), ("c", 7)] {
            store.push_row(vec![Value::from(g), Value::Integer(x)]).unwrap();
        }
        store
    }

    fn scan() -> Stage<'static> {
        Stage::Scan(AggregationPass::new(
            KeyField::new("g"),
            vec![StatSpec::average("mean", Extractor::field("x"))],
        ))
    }

    fn variance() -> Stage<'static> {
        Stage::PerGroup(Box::new(|group: &GroupResult| {
            let mean = group.get("mean").unwrap_or(f64::NAN);
            vec![StatSpec::variance("var", Extractor::field("x"), mean)]
        }))
    }

    #[test]
    fn dependent_pass_uses_first_pass_means() {
        let store = store();
        let report = Pipeline::new(&store, PipelineOptions::default())
            .run(&[
                scan(),
                variance(),
                Stage::Project(vec![Projection::std_dev("sd", "var")]),
            ])
            .unwrap();

        let a = report.group("a").unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(a.get("mean"), Some(2.0));
        assert_eq!(a.get("var"), Some(1.0));
        assert_eq!(a.get("sd"), Some(1.0));
        assert_eq!(report.group("b").unwrap().get("var"), Some(0.0));
    }

    #[test]
    fn stage_order_is_validated() {
        let store = store();
        let pipeline = Pipeline::new(&store, PipelineOptions::sequential());

        assert!(matches!(
            pipeline.run(&[]),
            Err(AggError::InvalidPipeline(_))
        ));
        assert!(matches!(
            pipeline.run(&[variance()]),
            Err(AggError::InvalidPipeline(_))
        ));
        assert!(matches!(
            pipeline.run(&[scan(), scan()]),
            Err(AggError::InvalidPipeline(_))
        ));
    }

    #[test]
    fn cancelled_pipeline_stops() {
        let store = store();
        let token = CancellationToken::new();
        token.cancel();
        let err = Pipeline::new(&store, PipelineOptions::default())
            .with_cancellation(token)
            .run(&[scan(), variance()])
            .unwrap_err();
        assert_eq!(err, AggError::Cancelled);
    }

    #[test]
    fn cancelling_mid_pass_skips_remaining_groups() {
        let store = store();
        let token = CancellationToken::new();
        let calls = AtomicUsize::new(0);
        let cancel_on_first_group = {
            let token = token.clone();
            let calls = &calls;
            Stage::PerGroup(Box::new(move |group: &GroupResult| {
                calls.fetch_add(1, Ordering::SeqCst);
                token.cancel();
                let mean = group.get("mean").unwrap_or(f64::NAN);
                vec![StatSpec::variance("var", Extractor::field("x"), mean)]
            }))
        };

        let err = Pipeline::new(&store, PipelineOptions::sequential())
            .with_cancellation(token)
            .run(&[scan(), cancel_on_first_group])
            .unwrap_err();

        assert_eq!(err, AggError::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
