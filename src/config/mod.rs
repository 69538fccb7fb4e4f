//! Connection configuration
//!
//! This module handles:
//! * `ConnectionConfig` and its builder
//! * The serde-facing settings form handed over by a hosting application
//! * URI validation and redaction

mod settings;
mod uri;

pub use settings::ConnectionSettings;
pub use uri::{ConnectionUri, HostAddr};

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::time::Duration;

/// Logical name used when a configuration does not carry one
pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// Default number of retries after the first failed attempt
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 9;

/// Default fixed delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Connection configuration
///
/// Carries everything the registry needs to open one named connection. Driver options
/// are passed through untouched to the connection factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Connection URI, handed to the factory as-is
    pub uri: String,
    /// Logical connection name (None means [`DEFAULT_CONNECTION_NAME`])
    pub name: Option<String>,
    /// Retries after the first failed attempt (0 = single attempt)
    pub retry_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
    /// Bound on a single factory invocation (None = unbounded)
    pub connect_timeout: Option<Duration>,
    /// Driver-specific options, opaque to the registry
    pub driver_options: Map<String, Value>,
}

impl ConnectionConfig {
    /// Create new configuration with defaults
    ///
    /// # Defaults
    ///
    /// - `name`: None (resolves to `"default"`)
    /// - `retry_attempts`: 9
    /// - `retry_delay`: 3 seconds
    /// - `connect_timeout`: None
    ///
    /// The URI is not validated here; use `builder()` for validation.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: None,
            driver_options: Map::new(),
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder("mongodb://localhost:27017/app")
    ///     .name("analytics")
    ///     .retry_attempts(3)
    ///     .retry_delay(Duration::from_millis(500))
    ///     .driver_option("maxPoolSize", 20)
    ///     .build()?;
    /// ```
    pub fn builder(uri: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::new(uri),
        }
    }

    /// Parse the JSON settings form (`{"uri": ..., "retryAttempts": ...}`)
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: ConnectionSettings = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid connection settings: {}", e)))?;
        settings.try_into()
    }

    /// Set the logical name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a driver option
    pub fn driver_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.driver_options.insert(key.into(), value.into());
        self
    }

    /// Logical name this configuration registers under
    pub fn connection_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_CONNECTION_NAME)
    }

    /// Total factory invocations allowed (first attempt plus retries)
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }

    /// URI with credentials masked, for logs
    ///
    /// Falls back to the scheme alone when the URI does not parse.
    pub fn redacted_uri(&self) -> String {
        match ConnectionUri::parse(&self.uri) {
            Ok(uri) => uri.redacted(),
            Err(_) => match self.uri.split_once("://") {
                Some((scheme, _)) => format!("{}://<unparsed>", scheme),
                None => "<unparsed>".to_string(),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::Config("connection URI must not be empty".into()));
        }
        ConnectionUri::parse(&self.uri)?;

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::Config("connection name must not be empty".into()));
            }
        }

        if self.retry_delay.subsec_nanos() % 1_000_000 != 0 {
            return Err(Error::Config(
                "retry_delay must be a whole number of milliseconds".into(),
            ));
        }
        if let Some(timeout) = self.connect_timeout {
            if timeout.subsec_nanos() % 1_000_000 != 0 {
                return Err(Error::Config(
                    "connect_timeout must be a whole number of milliseconds".into(),
                ));
            }
        }

        if self.connect_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "connect_timeout must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for creating a validated `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the logical connection name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Set the number of retries after the first failure
    ///
    /// Default: 9. Zero means a single attempt.
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    /// Set the fixed delay between attempts
    ///
    /// Default: 3 seconds. Zero retries immediately.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Bound every factory invocation
    ///
    /// An attempt that exceeds the bound counts as a failed attempt.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Add a driver-specific option
    pub fn driver_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.driver_options.insert(key.into(), value.into());
        self
    }

    /// Replace all driver-specific options
    pub fn driver_options(mut self, options: Map<String, Value>) -> Self {
        self.config.driver_options = options;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ConnectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
