//! Shared mock driver for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use conduit_lifecycle::{ConnectionConfig, ConnectionError, ConnectionFactory, Error, ManagedConnection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Install a test subscriber once; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How a mock connection behaves when closed
#[derive(Debug, Clone, Copy)]
pub enum CloseBehavior {
    Ok,
    AlreadyClosed,
    Fail,
    Hang,
}

/// Observable state shared between a mock connection and its factory
#[derive(Debug)]
pub struct Probe {
    pub id: usize,
    pub closed: AtomicBool,
    pub close_calls: AtomicUsize,
}

impl Probe {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockConnection {
    pub probe: Arc<Probe>,
    close_behavior: CloseBehavior,
}

impl MockConnection {
    pub fn new(id: usize) -> Self {
        Self {
            probe: Arc::new(Probe {
                id,
                closed: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
            }),
            close_behavior: CloseBehavior::Ok,
        }
    }

    pub fn with_close(mut self, behavior: CloseBehavior) -> Self {
        self.close_behavior = behavior;
        self
    }

    pub fn id(&self) -> usize {
        self.probe.id
    }
}

#[async_trait]
impl ManagedConnection for MockConnection {
    async fn close(&self) -> conduit_lifecycle::Result<()> {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        match self.close_behavior {
            CloseBehavior::Ok => {
                if self.probe.closed.swap(true, Ordering::SeqCst) {
                    return Err(Error::AlreadyClosed);
                }
                Ok(())
            }
            CloseBehavior::AlreadyClosed => {
                self.probe.closed.store(true, Ordering::SeqCst);
                Err(Error::AlreadyClosed)
            }
            CloseBehavior::Fail => Err(Error::Connection(ConnectionError::msg(
                "socket reset while closing",
            ))),
            CloseBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

/// Factory that fails a fixed number of times, then succeeds
pub struct MockFactory {
    failures_before_success: usize,
    connect_delay: Duration,
    close_behavior: CloseBehavior,
    panic_on_connect: bool,
    calls: AtomicUsize,
    created: Mutex<Vec<Arc<Probe>>>,
}

impl MockFactory {
    pub fn healthy() -> Self {
        Self::failing_then_ok(0)
    }

    pub fn failing_then_ok(failures: usize) -> Self {
        Self {
            failures_before_success: failures,
            connect_delay: Duration::ZERO,
            close_behavior: CloseBehavior::Ok,
            panic_on_connect: false,
            calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_then_ok(usize::MAX)
    }

    pub fn panicking() -> Self {
        Self {
            panic_on_connect: true,
            ..Self::healthy()
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_close(mut self, behavior: CloseBehavior) -> Self {
        self.close_behavior = behavior;
        self
    }

    /// Factory invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Probes of every connection this factory produced
    pub fn created(&self) -> Vec<Arc<Probe>> {
        self.created.lock().clone()
    }

    /// Wait until the factory has been invoked at least `n` times
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn create(&self, _config: &ConnectionConfig) -> Result<MockConnection, ConnectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.panic_on_connect {
            panic!("driver bug");
        }
        if call < self.failures_before_success {
            return Err(ConnectionError::msg(format!("connection refused (call {})", call + 1)));
        }

        let conn = MockConnection::new(call + 1).with_close(self.close_behavior);
        self.created.lock().push(Arc::clone(&conn.probe));
        Ok(conn)
    }
}

/// Configuration with no retry delay
pub fn config(retries: u32) -> ConnectionConfig {
    ConnectionConfig::builder("mongodb://localhost:27017/app")
        .retry_attempts(retries)
        .retry_delay(Duration::ZERO)
        .build()
        .expect("valid config")
}
