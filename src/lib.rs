//! SQL instrumentation proxy library.
//!
//! Wraps any [`driver::Connector`] so that every connect, prepare, query, exec,
//! transaction and close is reported to an [`observer::Observer`] with stable
//! correlation IDs, while the call itself reaches the backend unchanged.

pub mod client;
pub mod config;
pub mod context;
pub mod driver;
pub mod memdb;
pub mod observability;
pub mod observer;
pub mod proxy;
pub mod sequence;
pub mod timing;

pub use client::Database;
pub use config::schema::ScopeConfig;
pub use context::Context;
pub use observer::{DefaultObserver, Hook, HookSet, Observer};
pub use proxy::{wrap, wrap_with_sequence, ProxyConnector};
pub use sequence::{CorrelationId, IdSequence};
