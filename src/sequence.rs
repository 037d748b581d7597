//! Correlation ID generation.
//!
//! # Responsibilities
//! - Issue IDs for connections, statements, transactions and result cursors
//! - Keep IDs unique and increasing for the lifetime of a sequence
//!
//! Each proxy tree owns one [`IdSequence`]; independent trees in the same
//! process never observe each other's counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Identifier correlating every notification about one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic, thread-safe ID counter. The first issued ID is 1.
///
/// Relaxed ordering is enough: a single atomic has one modification order,
/// which gives uniqueness and per-thread monotonicity.
#[derive(Debug, Default)]
pub struct IdSequence {
    last: AtomicU64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence whose next ID is `last + 1`.
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Issue the next ID.
    pub fn next(&self) -> CorrelationId {
        CorrelationId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The most recently issued raw value, 0 if none.
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}
