//! Connection abstraction
//!
//! This module handles:
//! * The factory/handle contract implemented by driver adapters
//! * The per-name entry state machine enforced by the registry

mod factory;
mod state;

pub use factory::{factory_fn, ConnectionFactory, FnFactory, ManagedConnection};
pub use state::ConnectionState;
