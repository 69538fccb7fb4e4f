//! Serialized connection settings
//!
//! Shape of the configuration object a hosting application hands over, typically read
//! from a JSON config file. Durations are in milliseconds.

use super::ConnectionConfig;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Connection settings as supplied by the hosting application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionSettings {
    /// Connection URI
    pub uri: String,
    /// Logical connection name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Retries after the first failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    /// Delay between attempts, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<u64>,
    /// Per-attempt bound, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Opaque driver options
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub driver_options: Map<String, Value>,
}

impl TryFrom<ConnectionSettings> for ConnectionConfig {
    type Error = Error;

    fn try_from(settings: ConnectionSettings) -> Result<Self, Self::Error> {
        let mut builder = ConnectionConfig::builder(settings.uri)
            .driver_options(settings.driver_options);

        if let Some(name) = settings.name {
            builder = builder.name(name);
        }
        if let Some(attempts) = settings.retry_attempts {
            builder = builder.retry_attempts(attempts);
        }
        if let Some(delay_ms) = settings.retry_delay {
            builder = builder.retry_delay(Duration::from_millis(delay_ms));
        }
        if let Some(timeout_ms) = settings.connect_timeout {
            builder = builder.connect_timeout(Duration::from_millis(timeout_ms));
        }

        builder.build()
    }
}

/// Durations are carried in whole milliseconds; a validated configuration converts
/// back without loss.
impl From<&ConnectionConfig> for ConnectionSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            name: config.name.clone(),
            retry_attempts: Some(config.retry_attempts),
            retry_delay: Some(config.retry_delay.as_millis() as u64),
            connect_timeout: config.connect_timeout.map(|d| d.as_millis() as u64),
            driver_options: config.driver_options.clone(),
        }
    }
}
