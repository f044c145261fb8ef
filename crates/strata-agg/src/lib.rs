//! Grouped, multi-pass statistical aggregation.
//!
//! A report is computed as a short pipeline of passes over a [`RecordStore`]:
//! - a first [`AggregationPass`] scans every reference once, partitions it by a discrete key field
//!   and folds counts and means per group;
//! - dependent passes re-acquire each group's references from the [`KeyIndex`] and fold
//!   statistics that need the earlier results as constants (variance, covariance);
//! - [`Projection`]s derive ratios such as correlation from the finished groups.
//!
//! Per-record values come from [`Extractor`] expression trees, so derived fields (for example the
//! number of days between two timestamps) never have to be materialized in the store.

#![forbid(unsafe_code)]

mod accumulator;
mod cancel;
mod config;
mod correlate;
mod error;
mod extractor;
mod parallel;
mod pass;
mod pipeline;
mod projection;
mod report;
mod store;

pub use crate::accumulator::{Accumulator, StatSpec, Statistic};
pub use crate::cancel::CancellationToken;
pub use crate::config::{ExecutionMode, PipelineOptions};
pub use crate::correlate::{
    correlate, correlate_with, CorrelationReport, CorrelationRequest, VariableSummary,
};
pub use crate::error::{AggError, AggResult};
pub use crate::extractor::{BoundExtractor, Extractor, Scalar};
pub use crate::pass::{AggregationPass, KeyDomain, KeyField};
pub use crate::pipeline::{GroupStats, Pipeline, Stage};
pub use crate::projection::{correlation, Projection};
pub use crate::report::{GroupResult, Report};
pub use crate::store::{
    ColumnarStore, FieldId, FieldType, InMemoryStore, KeyIndex, KeyValue, RecordRef, RecordStore,
};

pub use strata_columnar::{ColumnSchema, ColumnType, Order, Value};
