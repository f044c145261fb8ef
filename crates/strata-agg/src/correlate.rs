//! Per-group means, variances, covariance and correlation of two variables.

use crate::accumulator::StatSpec;
use crate::config::PipelineOptions;
use crate::error::{AggError, AggResult};
use crate::extractor::Extractor;
use crate::pass::{AggregationPass, KeyField};
use crate::pipeline::{Pipeline, Stage};
use crate::projection::Projection;
use crate::report::GroupResult;
use crate::store::{KeyIndex, KeyValue};
use serde::Serialize;

const X_MEAN: &str = "x.mean";
const Y_MEAN: &str = "y.mean";
const X_VARIANCE: &str = "x.variance";
const Y_VARIANCE: &str = "y.variance";
const COVARIANCE: &str = "covariance";
const CORRELATION: &str = "correlation";

#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationRequest {
    pub key: KeyField,
    pub x: Extractor,
    pub y: Extractor,
}

impl CorrelationRequest {
    pub fn new(key: KeyField, x: Extractor, y: Extractor) -> Self {
        Self { key, x, y }
    }

    /// Mean pass, per-group variance/covariance pass, then the correlation projection.
    pub fn stages(&self) -> Vec<Stage<'static>> {
        let x = self.x.clone();
        let y = self.y.clone();
        vec![
            Stage::Scan(AggregationPass::new(
                self.key.clone(),
                vec![
                    StatSpec::average(X_MEAN, self.x.clone()),
                    StatSpec::average(Y_MEAN, self.y.clone()),
                ],
            )),
            Stage::PerGroup(Box::new(move |group: &GroupResult| {
                let mean_x = group.get(X_MEAN).unwrap_or(f64::NAN);
                let mean_y = group.get(Y_MEAN).unwrap_or(f64::NAN);
                vec![
                    StatSpec::variance(X_VARIANCE, x.clone(), mean_x),
                    StatSpec::variance(Y_VARIANCE, y.clone(), mean_y),
                    StatSpec::covariance(COVARIANCE, x.clone(), mean_x, y.clone(), mean_y),
                ]
            })),
            Stage::Project(vec![Projection::correlation(
                CORRELATION,
                COVARIANCE,
                X_VARIANCE,
                Y_VARIANCE,
            )]),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VariableSummary {
    pub mean: f64,
    pub variance: f64,
}

/// Statistics of one group. Undefined values (empty group, constant variable) are `NaN`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub key: KeyValue,
    pub count: u64,
    pub x: VariableSummary,
    pub y: VariableSummary,
    pub covariance: f64,
    pub correlation: f64,
}

impl TryFrom<&GroupResult> for CorrelationReport {
    type Error = AggError;

    fn try_from(group: &GroupResult) -> AggResult<Self> {
        let stat = |name: &str| {
            group
                .get(name)
                .ok_or_else(|| AggError::UnknownStatistic(name.to_string()))
        };
        Ok(Self {
            key: group.key.clone(),
            count: group.count,
            x: VariableSummary {
                mean: stat(X_MEAN)?,
                variance: stat(X_VARIANCE)?,
            },
            y: VariableSummary {
                mean: stat(Y_MEAN)?,
                variance: stat(Y_VARIANCE)?,
            },
            covariance: stat(COVARIANCE)?,
            correlation: stat(CORRELATION)?,
        })
    }
}

/// One report per key of `request.key`'s domain, in domain order.
pub fn correlate<S: KeyIndex>(
    store: &S,
    request: &CorrelationRequest,
    options: PipelineOptions,
) -> AggResult<Vec<CorrelationReport>> {
    correlate_with(&Pipeline::new(store, options), request)
}

/// Like [`correlate`], on a configured pipeline (e.g. one carrying a cancellation token).
pub fn correlate_with<S: KeyIndex>(
    pipeline: &Pipeline<'_, S>,
    request: &CorrelationRequest,
) -> AggResult<Vec<CorrelationReport>> {
    let report = pipeline.run(&request.stages())?;
    report
        .groups
        .iter()
        .map(CorrelationReport::try_from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use strata_columnar::{ColumnSchema, ColumnType, Value};

    #[test]
    fn perfectly_linear_variables_correlate() {
        let mut store = InMemoryStore::new(vec![
            ColumnSchema::new("k", ColumnType::String),
            ColumnSchema::new("x", ColumnType::Number),
            ColumnSchema::new("y", ColumnType::Number),
        ]);
        for x in [1.0, 2.0, 3.0, 4.0] {
            store
                .push_row(vec![
                    Value::from("k"),
                    Value::Number(x),
                    Value::Number(10.0 - 2.0 * x),
                ])
                .unwrap();
        }

        let request = CorrelationRequest::new(
            KeyField::new("k"),
            Extractor::field("x"),
            Extractor::field("y"),
        );
        let reports = correlate(&store, &request, PipelineOptions::sequential()).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.count, 4);
        assert_eq!(report.x.mean, 2.5);
        assert_eq!(report.y.mean, 5.0);
        assert_eq!(report.x.variance, 1.25);
        assert_eq!(report.y.variance, 5.0);
        assert_eq!(report.covariance, -2.5);
        assert!((report.correlation + 1.0).abs() < 1e-12);
    }
}
