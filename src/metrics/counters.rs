//! Counter metrics

use super::labels;

/// Record a factory invocation
pub fn connect_attempted(name: &str) {
    metrics::counter!(labels::CONNECT_ATTEMPTS_TOTAL, labels::LABEL_NAME => name.to_string())
        .increment(1);
}

/// Record a failed factory invocation
pub fn connect_failed(name: &str) {
    metrics::counter!(labels::CONNECT_FAILURES_TOTAL, labels::LABEL_NAME => name.to_string())
        .increment(1);
}

/// Record an initialization that ran out of attempts
pub fn retries_exhausted(name: &str) {
    metrics::counter!(labels::RETRIES_EXHAUSTED_TOTAL, labels::LABEL_NAME => name.to_string())
        .increment(1);
}

/// Record an acquire call and how it was served
pub fn acquire(name: &str, source: &'static str) {
    metrics::counter!(
        labels::ACQUIRES_TOTAL,
        labels::LABEL_NAME => name.to_string(),
        labels::LABEL_SOURCE => source
    )
    .increment(1);
}

/// Record an initialization cancelled by shutdown
pub fn acquire_cancelled(name: &str) {
    metrics::counter!(labels::ACQUIRES_CANCELLED_TOTAL, labels::LABEL_NAME => name.to_string())
        .increment(1);
}

/// Record a release and its outcome
pub fn release(name: &str, outcome: &'static str) {
    metrics::counter!(
        labels::RELEASES_TOTAL,
        labels::LABEL_NAME => name.to_string(),
        labels::LABEL_OUTCOME => outcome
    )
    .increment(1);
}

/// Record a connection that failed to come up during startup
pub fn startup_failed(name: &str, category: &'static str) {
    metrics::counter!(
        labels::STARTUP_FAILURES_TOTAL,
        labels::LABEL_NAME => name.to_string(),
        labels::LABEL_CATEGORY => category
    )
    .increment(1);
}
