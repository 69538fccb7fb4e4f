//! Connection factory abstraction
//!
//! The registry never talks to a database itself. A driver adapter implements
//! [`ConnectionFactory`] to open a client and [`ManagedConnection`] to close it.

use crate::config::ConnectionConfig;
use crate::error::ConnectionError;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// A live client connection owned by the registry
#[async_trait]
pub trait ManagedConnection: Send + Sync + 'static {
    /// Close the underlying client
    ///
    /// Called exactly once by the registry. Returning [`crate::Error::AlreadyClosed`]
    /// is treated as a successful release.
    async fn close(&self) -> Result<()>;
}

/// Opens client connections for the registry
///
/// Implementations must be safe to call repeatedly: a failed attempt must not leave a
/// partially opened resource behind.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Client handle produced by this factory
    type Connection: ManagedConnection;

    /// Open one connection
    async fn create(
        &self,
        config: &ConnectionConfig,
    ) -> std::result::Result<Self::Connection, ConnectionError>;
}

/// [`ConnectionFactory`] backed by an async closure
///
/// Built with [`factory_fn`].
pub struct FnFactory<F, Fut, C> {
    f: F,
    _marker: PhantomData<fn() -> (Fut, C)>,
}

/// Adapt an async closure into a [`ConnectionFactory`]
///
/// # Examples
///
/// ```ignore
/// let factory = factory_fn(|config: ConnectionConfig| async move {
///     MyDriver::connect(&config.uri).await.map_err(ConnectionError::new)
/// });
/// let registry = ConnectionRegistry::new(factory);
/// ```
pub fn factory_fn<F, Fut, C>(f: F) -> FnFactory<F, Fut, C>
where
    F: Fn(ConnectionConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<C, ConnectionError>> + Send + 'static,
    C: ManagedConnection,
{
    FnFactory {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, C> ConnectionFactory for FnFactory<F, Fut, C>
where
    F: Fn(ConnectionConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<C, ConnectionError>> + Send + 'static,
    C: ManagedConnection,
{
    type Connection = C;

    async fn create(
        &self,
        config: &ConnectionConfig,
    ) -> std::result::Result<C, ConnectionError> {
        (self.f)(config.clone()).await
    }
}
