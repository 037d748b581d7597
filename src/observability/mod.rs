//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Library code and observers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Log level configurable via config and environment
//! - Metrics are cheap (atomic increments)
//! - Both are opt-in for library users; the demo binary wires them up

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use self::metrics::init_metrics;
