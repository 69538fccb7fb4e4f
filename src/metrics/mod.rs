//! Metrics for connection lifecycle observability
//!
//! Thin wrappers over the `metrics` facade. Nothing is recorded unless the host
//! application installs a recorder.

pub mod counters;
pub mod gauges;
pub mod histograms;
pub mod labels;
