//! Startup and shutdown hooks for a hosting application
//!
//! The host owns a [`ConnectionLifecycle`], calls [`ConnectionLifecycle::on_start`] once
//! while booting and [`ConnectionLifecycle::on_stop`] once while shutting down.
//!
//! Connections are registered either with a ready configuration or with a
//! [`ConnectionOptionsFactory`] resolved when startup runs (for options that come from
//! another async source, such as a secrets store).

mod options;

pub use options::{options_fn, ConnectionOptionsFactory, OptionsFn};

use crate::config::ConnectionConfig;
use crate::connection::ConnectionFactory;
use crate::metrics::counters;
use crate::registry::{ConnectionRegistry, DrainReport};
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Default bound on the shutdown drain
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Eager startup and bounded shutdown of a set of named connections
pub struct ConnectionLifecycle<F: ConnectionFactory> {
    registry: ConnectionRegistry<F>,
    sources: Vec<(String, Arc<dyn ConnectionOptionsFactory>)>,
    shutdown_timeout: Duration,
}

impl<F: ConnectionFactory> ConnectionLifecycle<F> {
    /// Start building a lifecycle around `registry`
    pub fn builder(registry: ConnectionRegistry<F>) -> LifecycleBuilder<F> {
        LifecycleBuilder {
            registry,
            sources: Vec::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// The registry driven by this lifecycle
    pub fn registry(&self) -> &ConnectionRegistry<F> {
        &self.registry
    }

    /// Names of all registered connections, in registration order
    pub fn connection_names(&self) -> Vec<&str> {
        self.sources.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Bound applied to the shutdown drain
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Eagerly acquire the named connections
    ///
    /// Every name is attempted concurrently, even when another one fails. The first
    /// fatal failure in `names` order is returned as [`Error::Startup`]; a cancellation
    /// is only reported when nothing fatal happened.
    pub async fn on_start(&self, names: &[&str]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for name in names {
            if !seen.insert(*name) {
                continue;
            }
            let source = self.source(name).ok_or_else(|| {
                Error::Config(format!("no configuration registered for connection '{}'", name))
            })?;
            targets.push((*name, source));
        }

        let span = tracing::info_span!("on_start", connections = targets.len());
        async {
            let attempts = targets.into_iter().map(|(name, source)| async move {
                let result = match source.create_options().await {
                    Ok(config) => self.registry.acquire(name, &config).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                (name, result)
            });

            let mut first_fatal = None;
            let mut first_other = None;
            for (name, result) in futures::future::join_all(attempts).await {
                match result {
                    Ok(()) => tracing::info!(connection = %name, "connection started"),
                    Err(e) => {
                        tracing::error!(connection = %name, error = %e, "connection failed to start");
                        counters::startup_failed(name, e.category());
                        let slot = if e.is_fatal() {
                            &mut first_fatal
                        } else {
                            &mut first_other
                        };
                        if slot.is_none() {
                            *slot = Some((name, e));
                        }
                    }
                }
            }

            match first_fatal.or(first_other) {
                Some((name, e)) => Err(Error::Startup {
                    name: name.to_string(),
                    source: Box::new(e),
                }),
                None => {
                    tracing::info!("all connections started");
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Eagerly acquire every registered connection
    pub async fn on_start_all(&self) -> Result<()> {
        let names: Vec<String> = self.sources.iter().map(|(name, _)| name.clone()).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.on_start(&names).await
    }

    /// Latch shutdown and drain every connection within the shutdown timeout
    ///
    /// Never fails; problems are logged and returned in the report.
    pub async fn on_stop(&self) -> DrainReport {
        let span = tracing::info_span!(
            "on_stop",
            timeout_ms = self.shutdown_timeout.as_millis() as u64
        );
        async {
            self.registry.shutdown();
            let report = self.registry.release_all_within(self.shutdown_timeout).await;

            for (name, err) in &report.failed {
                tracing::warn!(connection = %name, error = %err, "connection release failed");
            }
            for name in &report.abandoned {
                tracing::warn!(connection = %name, "connection release abandoned at shutdown deadline");
            }

            if report.is_clean() {
                tracing::info!(%report, "connections drained");
            } else {
                tracing::warn!(
                    %report,
                    problems = report.problem_count(),
                    "connections drained with problems"
                );
            }
            report
        }
        .instrument(span)
        .await
    }

    fn source(&self, name: &str) -> Option<Arc<dyn ConnectionOptionsFactory>> {
        self.sources
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, source)| Arc::clone(source))
    }
}

/// Builder for [`ConnectionLifecycle`]
pub struct LifecycleBuilder<F: ConnectionFactory> {
    registry: ConnectionRegistry<F>,
    sources: Vec<(String, Arc<dyn ConnectionOptionsFactory>)>,
    shutdown_timeout: Duration,
}

impl<F: ConnectionFactory> LifecycleBuilder<F> {
    /// Register a connection with a ready configuration
    ///
    /// The connection is registered under the configuration's logical name.
    pub fn connection(mut self, config: ConnectionConfig) -> Self {
        let name = config.connection_name().to_string();
        self.sources.push((name, Arc::new(config)));
        self
    }

    /// Register a connection whose configuration is produced at startup
    pub fn connection_from(
        mut self,
        name: impl Into<String>,
        options: impl ConnectionOptionsFactory + 'static,
    ) -> Self {
        self.sources.push((name.into(), Arc::new(options)));
        self
    }

    /// Bound the shutdown drain
    ///
    /// Default: 30 seconds
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build the lifecycle, rejecting duplicate connection names
    pub fn build(self) -> Result<ConnectionLifecycle<F>> {
        let mut seen = HashSet::new();
        for (name, _) in &self.sources {
            if name.trim().is_empty() {
                return Err(Error::Config("connection name must not be empty".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!(
                    "connection '{}' registered more than once",
                    name
                )));
            }
        }

        Ok(ConnectionLifecycle {
            registry: self.registry,
            sources: self.sources,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{factory_fn, ManagedConnection};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Conn;

    #[async_trait]
    impl ManagedConnection for Conn {
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn registry() -> ConnectionRegistry<impl ConnectionFactory<Connection = Conn>> {
        ConnectionRegistry::new(factory_fn(|_| async { Ok(Conn) }))
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let result = ConnectionLifecycle::builder(registry())
            .connection(ConnectionConfig::new("mongodb://a/app"))
            .connection(ConnectionConfig::new("mongodb://b/app"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_keeps_registration_order() {
        let lifecycle = ConnectionLifecycle::builder(registry())
            .connection(ConnectionConfig::new("mongodb://a/app").name("primary"))
            .connection(ConnectionConfig::new("mongodb://b/app").name("analytics"))
            .shutdown_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(lifecycle.connection_names(), vec!["primary", "analytics"]);
        assert_eq!(lifecycle.shutdown_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_duplicate_start_names_acquire_once() {
        let lifecycle = ConnectionLifecycle::builder(registry())
            .connection(ConnectionConfig::new("mongodb://a/app"))
            .build()
            .unwrap();

        lifecycle.on_start(&["default", "default"]).await.unwrap();
        assert!(lifecycle.registry().get("default").is_some());
    }
}
