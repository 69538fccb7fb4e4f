//! Named database connection lifecycle management
//!
//! conduit-lifecycle keeps a registry of named client connections for a hosting
//! application:
//!
//! * **Bounded retry**: each connection is opened through a fixed-delay retry loop
//! * **Single-flight**: concurrent requests for one name share a single initialization
//! * **Bounded drain**: shutdown releases every handle within a deadline and reports
//!   failures instead of raising them
//!
//! Opening and closing clients is delegated to a driver adapter implementing
//! [`ConnectionFactory`].
//!
//! # Examples
//!
//! ```ignore
//! use conduit_lifecycle::{ConnectionConfig, ConnectionLifecycle, ConnectionRegistry};
//!
//! let registry = ConnectionRegistry::new(MongoFactory::default());
//! let lifecycle = ConnectionLifecycle::builder(registry.clone())
//!     .connection(ConnectionConfig::builder("mongodb://localhost:27017/app").build()?)
//!     .build()?;
//!
//! lifecycle.on_start_all().await?;
//! let client = registry.get("default").expect("started");
//! // ...
//! let report = lifecycle.on_stop().await;
//! ```

#![deny(clippy::expect_used, clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod retry;

pub use config::{ConnectionConfig, ConnectionSettings, DEFAULT_CONNECTION_NAME};
pub use connection::{factory_fn, ConnectionFactory, ConnectionState, ManagedConnection};
pub use error::{ConnectionError, Error, Result};
pub use lifecycle::{options_fn, ConnectionLifecycle, ConnectionOptionsFactory};
pub use registry::{ConnectionRegistry, DrainReport};
pub use retry::{execute_with_retry, RetryPolicy};
