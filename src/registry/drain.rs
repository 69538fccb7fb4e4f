//! Aggregate outcome of a registry drain

use crate::Error;
use std::fmt;

/// Result of releasing every entry of a registry
///
/// A drain never fails as a whole; individual outcomes are collected here.
#[derive(Debug, Default, Clone)]
pub struct DrainReport {
    /// Connections closed (or found already closed)
    pub released: Vec<String>,
    /// Connections whose close returned an error
    pub failed: Vec<(String, Error)>,
    /// Connections whose close did not finish before the deadline
    pub abandoned: Vec<String>,
    /// Entries still initializing when the drain ran
    pub pending: Vec<String>,
}

impl DrainReport {
    /// True when every connection was released in time
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.abandoned.is_empty()
    }

    /// Number of connections that were not released cleanly
    pub fn problem_count(&self) -> usize {
        self.failed.len() + self.abandoned.len()
    }

    pub(crate) fn sort(&mut self) {
        self.released.sort();
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
        self.abandoned.sort();
        self.pending.sort();
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "released={} failed={} abandoned={} pending={}",
            self.released.len(),
            self.failed.len(),
            self.abandoned.len(),
            self.pending.len()
        )
    }
}
