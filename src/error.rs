//! Error types for conduit-lifecycle
//!
//! Errors are cheap to clone: a single initialization outcome is fanned out to every
//! caller waiting on the same connection name.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a driver adapter
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a connection factory or by closing a connection
///
/// The cause is opaque to the registry; it is only logged and propagated.
#[derive(Debug, Clone, Error)]
#[error("{cause}")]
pub struct ConnectionError {
    #[source]
    cause: Arc<dyn std::error::Error + Send + Sync>,
}

impl ConnectionError {
    /// Wrap a driver error
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self {
            cause: Arc::from(cause.into()),
        }
    }

    /// Build an error from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }

    /// Underlying driver error
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.cause
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

/// Main error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A single connection attempt failed
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// All configured attempts failed
    #[error("connection failed after {attempts} attempt(s): {last_cause}")]
    RetryExhausted {
        /// Total number of factory invocations
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        last_cause: ConnectionError,
    },

    /// Shutdown interrupted an in-flight acquire
    #[error("connection acquire cancelled by shutdown")]
    Cancelled,

    /// Connection was already closed by the driver
    #[error("connection already closed")]
    AlreadyClosed,

    /// Invalid registry entry state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Eager startup of a named connection failed
    #[error("startup of connection '{name}' failed: {source}")]
    Startup {
        /// Logical connection name
        name: String,
        /// Failure surfaced by the acquire
        #[source]
        source: Box<Error>,
    },

    /// A release did not finish before the drain deadline
    #[error("release of connection '{name}' abandoned after {timeout:?}")]
    ReleaseTimeout {
        /// Logical connection name
        name: String,
        /// Drain bound that was exceeded
        timeout: Duration,
    },
}

impl Error {
    /// Returns true if the error is terminal for the current startup
    ///
    /// Cancellation is not fatal: it only happens once shutdown has begun.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::AlreadyClosed)
    }

    /// Number of factory invocations behind this error, if it came from a retry loop
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetryExhausted { attempts, .. } => Some(*attempts),
            Error::Startup { source, .. } => source.attempts(),
            _ => None,
        }
    }

    /// Error category for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Connection(_) => "connection",
            Error::RetryExhausted { .. } => "retry_exhausted",
            Error::Cancelled => "cancelled",
            Error::AlreadyClosed => "already_closed",
            Error::InvalidState { .. } => "invalid_state",
            Error::Startup { .. } => "startup",
            Error::ReleaseTimeout { .. } => "release_timeout",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
