//! Histogram metrics

use super::labels;

/// Record the duration of a single factory invocation
pub fn connect_duration(name: &str, outcome: &'static str, duration_ms: u64) {
    metrics::histogram!(
        labels::CONNECT_DURATION_MS,
        labels::LABEL_NAME => name.to_string(),
        labels::LABEL_OUTCOME => outcome
    )
    .record(duration_ms as f64);
}

/// Record the duration of a shutdown drain
pub fn drain_duration(duration_ms: u64) {
    metrics::histogram!(labels::DRAIN_DURATION_MS).record(duration_ms as f64);
}
