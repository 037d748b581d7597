//! Configuration for observers and process observability.
//!
//! # Data Flow
//! ```text
//! sqlscope.toml
//!     → loader.rs (read + TOML decode)
//!     → validation.rs (level names, metrics address)
//!     → ScopeConfig
//!
//! On file change:
//!     watcher.rs sees the edit
//!     → loader.rs + validation.rs again
//!     → forwarded only if it differs from the current one
//!     → spawn_observer_reload swaps the default observer's settings
//! ```
//!
//! # Design Decisions
//! - Every section and field has a default, so an empty file is valid
//! - serde rejects malformed documents; validation.rs rejects bad values
//! - An invalid edit never replaces a running configuration

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ObservabilityConfig, ObserverConfig, ScopeConfig, StructuredConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::{spawn_observer_reload, ConfigWatcher};
