//! Gauge metrics
//!
//! The ready gauge is shared by every registry in the process, so registries only
//! apply deltas to it.

use super::labels;

/// An entry became Ready
pub fn connection_ready() {
    metrics::gauge!(labels::READY_CONNECTIONS).increment(1.0);
}

/// A Ready entry was removed
pub fn connection_removed() {
    metrics::gauge!(labels::READY_CONNECTIONS).decrement(1.0);
}
