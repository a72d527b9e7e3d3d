//! stripmon-stats: Aggregation of cluster metrics over a monitoring run.
//!
//! This crate provides the bounded-memory statistics the monitor fills:
//! - **MetricAccumulator** - binned histogram with running moments
//! - **Profile** - per-bin mean of a quantity against position
//! - **TrendBuffer** - fixed-size time series with rebin, slide or reset on overflow
//! - **KeyedMetricRegistry** - lazily created metric bundles per monitor key
//! - **StripMonitor** - per-event pipeline from clusters to registry fills
//!
#![warn(missing_docs)]

mod accumulator;
mod processing;
mod profile;
mod registry;
pub mod schema;
mod trend;

pub use accumulator::{HistogramSpec, MetricAccumulator};
pub use processing::{EventSummary, MonitorConfig, Outcome, RunStatistics, StripMonitor};
pub use profile::Profile;
pub use registry::{KeyedMetricRegistry, MetricBundle};
pub use schema::{Category, MetricKind, MetricSchema, MetricSpec};
pub use trend::{DecimationMode, FillOutcome, TrendBin, TrendBuffer, TrendConfig};

// Re-export the core types callers need alongside the registry
pub use stripmon_core::key::{MonitorKey, Scope, TrackFlag};
