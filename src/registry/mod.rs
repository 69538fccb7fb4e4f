//! Named connection registry
//!
//! Maps logical connection names to live handles and guarantees at most one
//! initialization in flight per name (single-flight):
//!
//! ```text
//! acquire(name)
//!   → Ready         → return cached handle
//!   → Initializing  → join waiter list, share the eventual outcome
//!   → absent/Failed → new Initializing entry, spawn retry loop over the factory
//! ```
//!
//! All entry mutations happen under one mutex. Factory calls and retry waits run in a
//! spawned task outside the lock, so a slow name never blocks the others and a dropped
//! caller never strands the remaining waiters.

mod drain;

pub use drain::DrainReport;

use crate::config::ConnectionConfig;
use crate::connection::{ConnectionFactory, ConnectionState, ManagedConnection};
use crate::error::ConnectionError;
use crate::metrics::{counters, gauges, histograms, labels};
use crate::retry::RetryPolicy;
use crate::{Error, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type Outcome<C> = Result<Arc<C>>;
type Waiter<C> = oneshot::Sender<Outcome<C>>;

/// One named entry
struct Entry<C> {
    state: ConnectionState,
    handle: Option<Arc<C>>,
    waiters: Vec<Waiter<C>>,
    last_error: Option<Error>,
}

impl<C> Entry<C> {
    fn initializing(first_waiter: Waiter<C>) -> Self {
        Self {
            state: ConnectionState::Initializing,
            handle: None,
            waiters: vec![first_waiter],
            last_error: None,
        }
    }
}

struct Inner<F: ConnectionFactory> {
    factory: F,
    entries: Mutex<HashMap<String, Entry<F::Connection>>>,
    shutdown: CancellationToken,
}

/// Registry of named connections
///
/// Cheap to clone; clones share the same entries and shutdown signal.
pub struct ConnectionRegistry<F: ConnectionFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: ConnectionFactory> Clone for ConnectionRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> ConnectionRegistry<F> {
    /// Create an empty registry around a connection factory
    pub fn new(factory: F) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                entries: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// The connection factory
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Acquire the connection registered under `name`
    ///
    /// Concurrent callers for the same name share one factory invocation sequence and
    /// receive the same handle or the same error.
    pub async fn acquire(
        &self,
        name: &str,
        config: &ConnectionConfig,
    ) -> Result<Arc<F::Connection>> {
        config.validate()?;

        let rx = {
            let mut entries = self.inner.entries.lock();
            if self.inner.shutdown.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match entries.get(name).map(|entry| entry.state) {
                Some(ConnectionState::Ready) => {
                    if let Some(handle) = entries.get(name).and_then(|e| e.handle.clone()) {
                        counters::acquire(name, labels::SOURCE_CACHED);
                        return Ok(handle);
                    }
                    return Err(Error::InvalidState {
                        expected: "ready entry with a handle".into(),
                        actual: "ready entry without a handle".into(),
                    });
                }
                Some(ConnectionState::Initializing) => {
                    let (tx, rx) = oneshot::channel();
                    if let Some(entry) = entries.get_mut(name) {
                        entry.waiters.push(tx);
                    }
                    counters::acquire(name, labels::SOURCE_JOINED);
                    tracing::debug!(connection = %name, "joining in-flight initialization");
                    rx
                }
                Some(ConnectionState::Failed) | Some(ConnectionState::Closed) | None => {
                    let (tx, rx) = oneshot::channel();
                    entries.insert(name.to_string(), Entry::initializing(tx));
                    counters::acquire(name, labels::SOURCE_INITIATED);
                    self.spawn_initialization(name.to_string(), config.clone());
                    rx
                }
            }
        };

        // A dropped sender means the entry was discarded without an outcome
        rx.await.unwrap_or(Err(Error::Cancelled))
    }

    /// Acquire using the configuration's own logical name
    pub async fn acquire_with(&self, config: &ConnectionConfig) -> Result<Arc<F::Connection>> {
        self.acquire(config.connection_name(), config).await
    }

    /// Ready handle for `name`, without waiting or connecting
    pub fn get(&self, name: &str) -> Option<Arc<F::Connection>> {
        let entries = self.inner.entries.lock();
        entries
            .get(name)
            .filter(|entry| entry.state == ConnectionState::Ready)
            .and_then(|entry| entry.handle.clone())
    }

    /// Current state of the entry for `name`
    pub fn state(&self, name: &str) -> Option<ConnectionState> {
        self.inner.entries.lock().get(name).map(|entry| entry.state)
    }

    /// Error that moved `name` to Failed, if it is still in that state
    pub fn last_error(&self, name: &str) -> Option<Error> {
        self.inner
            .entries
            .lock()
            .get(name)
            .and_then(|entry| entry.last_error.clone())
    }

    /// Names of all current entries, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Release the connection registered under `name`
    ///
    /// No-op for unknown names. Failed entries are forgotten. An entry that is still
    /// initializing is left alone.
    pub async fn release(&self, name: &str) -> Result<()> {
        let handle = {
            let mut entries = self.inner.entries.lock();
            match entries.get(name).map(|entry| entry.state) {
                None => {
                    tracing::debug!(connection = %name, "release of unknown connection ignored");
                    return Ok(());
                }
                Some(ConnectionState::Initializing) => {
                    tracing::debug!(connection = %name, "release skipped, still initializing");
                    return Ok(());
                }
                Some(ConnectionState::Failed) | Some(ConnectionState::Closed) => {
                    entries.remove(name);
                    return Ok(());
                }
                Some(ConnectionState::Ready) => {
                    let handle = match entries.remove(name) {
                        Some(mut entry) => {
                            entry.state.transition(ConnectionState::Closed)?;
                            entry.handle.take()
                        }
                        None => None,
                    };
                    gauges::connection_removed();
                    handle
                }
            }
        };

        match handle {
            Some(handle) => close_handle(name, handle.as_ref()).await,
            None => Ok(()),
        }
    }

    /// Release every entry, collecting failures
    pub async fn release_all(&self) -> DrainReport {
        self.drain(None).await
    }

    /// Release every entry, abandoning releases still running after `timeout`
    pub async fn release_all_within(&self, timeout: Duration) -> DrainReport {
        self.drain(Some(timeout)).await
    }

    /// Latch the shutdown signal
    ///
    /// Retry waits in flight are cancelled and their waiters fail with
    /// [`Error::Cancelled`]; later acquires fail the same way. Ready entries are kept
    /// until drained.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            tracing::info!("connection registry shutting down");
        }
        self.inner.shutdown.cancel();
    }

    /// Whether the shutdown signal has been latched
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Token cancelled on shutdown, for tying other tasks to the registry's lifetime
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    fn spawn_initialization(&self, name: String, config: ConnectionConfig) {
        let registry = self.clone();
        let span = tracing::info_span!(
            "initialize",
            connection = %name,
            uri = %config.redacted_uri()
        );

        tokio::spawn(
            async move {
                let outcome = AssertUnwindSafe(registry.connect(&name, &config))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        tracing::error!("connection factory panicked");
                        Err(Error::Connection(ConnectionError::msg(
                            "connection factory panicked",
                        )))
                    });
                registry.complete(&name, outcome).await;
            }
            .instrument(span),
        );
    }

    async fn connect(&self, name: &str, config: &ConnectionConfig) -> Result<F::Connection> {
        let factory = &self.inner.factory;
        let policy = RetryPolicy::from_config(config);

        policy
            .execute(&self.inner.shutdown, |attempt| async move {
                counters::connect_attempted(name);
                tracing::debug!(attempt, "opening connection");

                let started = Instant::now();
                let result = factory.create(config).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(_) => {
                        histograms::connect_duration(name, labels::OUTCOME_OK, elapsed_ms);
                    }
                    Err(e) => {
                        counters::connect_failed(name);
                        histograms::connect_duration(name, labels::OUTCOME_FAILED, elapsed_ms);
                        tracing::debug!(attempt, error = %e, "connection attempt failed");
                    }
                }
                result
            })
            .await
    }

    /// Publish an initialization outcome to every waiter
    async fn complete(&self, name: &str, outcome: Result<F::Connection>) {
        let mut orphan = None;

        let (waiters, shared) = {
            let mut entries = self.inner.entries.lock();
            let Some(entry) = entries.get_mut(name) else {
                tracing::error!("initialization finished for a missing entry");
                return;
            };
            let waiters = std::mem::take(&mut entry.waiters);

            let shared = match outcome {
                Ok(conn) if self.inner.shutdown.is_cancelled() => {
                    // Shutdown raced the connect: the handle must not outlive the drain
                    entries.remove(name);
                    orphan = Some(conn);
                    counters::acquire_cancelled(name);
                    Err(Error::Cancelled)
                }
                Ok(conn) => {
                    let handle = Arc::new(conn);
                    match entry.state.transition(ConnectionState::Ready) {
                        Ok(()) => {
                            entry.handle = Some(Arc::clone(&handle));
                            gauges::connection_ready();
                            tracing::info!(waiters = waiters.len(), "connection ready");
                            Ok(handle)
                        }
                        Err(e) => {
                            entries.remove(name);
                            orphan = Arc::into_inner(handle);
                            Err(e)
                        }
                    }
                }
                Err(Error::Cancelled) => {
                    entries.remove(name);
                    counters::acquire_cancelled(name);
                    tracing::info!(waiters = waiters.len(), "initialization cancelled");
                    Err(Error::Cancelled)
                }
                Err(err) => {
                    if let Error::RetryExhausted { .. } = err {
                        counters::retries_exhausted(name);
                    }
                    if let Err(e) = entry.state.transition(ConnectionState::Failed) {
                        tracing::error!(error = %e, "failed to mark entry as failed");
                    }
                    entry.last_error = Some(err.clone());
                    Err(err)
                }
            };

            (waiters, shared)
        };

        for waiter in waiters {
            // Receiver gone means that caller stopped waiting
            let _ = waiter.send(shared.clone());
        }

        if let Some(conn) = orphan {
            if let Err(e) = close_handle(name, &conn).await {
                tracing::warn!(error = %e, "failed to close connection opened during shutdown");
            }
        }
    }

    async fn drain(&self, timeout: Option<Duration>) -> DrainReport {
        let started = Instant::now();
        let mut report = DrainReport::default();

        let handles = {
            let mut entries = self.inner.entries.lock();
            let names: Vec<String> = entries.keys().cloned().collect();
            let mut handles = Vec::new();

            for name in names {
                let state = entries.get(&name).map(|entry| entry.state);
                match state {
                    Some(ConnectionState::Initializing) => report.pending.push(name),
                    Some(ConnectionState::Ready) => {
                        if let Some(mut entry) = entries.remove(&name) {
                            gauges::connection_removed();
                            if let Err(e) = entry.state.transition(ConnectionState::Closed) {
                                report.failed.push((name, e));
                                continue;
                            }
                            if let Some(handle) = entry.handle.take() {
                                handles.push((name, handle));
                            }
                        }
                    }
                    Some(ConnectionState::Failed) | Some(ConnectionState::Closed) => {
                        entries.remove(&name);
                    }
                    None => {}
                }
            }

            handles
        };

        if handles.is_empty() && report.pending.is_empty() {
            tracing::debug!("nothing to drain");
        }

        let deadline = timeout.map(|t| (tokio::time::Instant::now() + t, t));
        let releases = handles.into_iter().map(|(name, handle)| async move {
            let result = match deadline {
                Some((deadline, bound)) => {
                    match tokio::time::timeout_at(deadline, close_handle(&name, handle.as_ref()))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            counters::release(&name, labels::OUTCOME_ABANDONED);
                            Err(Error::ReleaseTimeout {
                                name: name.clone(),
                                timeout: bound,
                            })
                        }
                    }
                }
                None => close_handle(&name, handle.as_ref()).await,
            };
            (name, result)
        });

        for (name, result) in futures::future::join_all(releases).await {
            match result {
                Ok(()) => report.released.push(name),
                Err(Error::ReleaseTimeout { .. }) => report.abandoned.push(name),
                Err(e) => report.failed.push((name, e)),
            }
        }

        report.sort();
        histograms::drain_duration(started.elapsed().as_millis() as u64);
        report
    }
}

/// Close one handle; an already-closed handle counts as released
async fn close_handle<C: ManagedConnection>(name: &str, handle: &C) -> Result<()> {
    match handle.close().await {
        Ok(()) => {
            counters::release(name, labels::OUTCOME_OK);
            tracing::info!(connection = %name, "connection released");
            Ok(())
        }
        Err(Error::AlreadyClosed) => {
            counters::release(name, labels::OUTCOME_ALREADY_CLOSED);
            tracing::debug!(connection = %name, "connection was already closed");
            Ok(())
        }
        Err(e) => {
            counters::release(name, labels::OUTCOME_FAILED);
            tracing::warn!(connection = %name, error = %e, "connection release failed");
            Err(e)
        }
    }
}
