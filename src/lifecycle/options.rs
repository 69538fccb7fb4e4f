//! Deferred connection options

use crate::config::ConnectionConfig;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Produces a connection configuration when startup runs
#[async_trait]
pub trait ConnectionOptionsFactory: Send + Sync {
    /// Build the configuration for one connection
    async fn create_options(&self) -> Result<ConnectionConfig>;
}

#[async_trait]
impl ConnectionOptionsFactory for ConnectionConfig {
    async fn create_options(&self) -> Result<ConnectionConfig> {
        Ok(self.clone())
    }
}

/// [`ConnectionOptionsFactory`] backed by an async closure
pub struct OptionsFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Adapt an async closure into a [`ConnectionOptionsFactory`]
///
/// # Examples
///
/// ```ignore
/// let options = options_fn(|| async {
///     let uri = secrets.get("oauth-db-uri").await?;
///     ConnectionConfig::builder(uri).retry_attempts(3).build()
/// });
/// ```
pub fn options_fn<F, Fut>(f: F) -> OptionsFn<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ConnectionConfig>> + Send + 'static,
{
    OptionsFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> ConnectionOptionsFactory for OptionsFn<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ConnectionConfig>> + Send + 'static,
{
    async fn create_options(&self) -> Result<ConnectionConfig> {
        (self.f)().await
    }
}
