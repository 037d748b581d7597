//! Driver error taxonomy.

use thiserror::Error;

use crate::context::ContextError;

/// Errors crossing the driver surface.
///
/// Errors produced by a backend are handed back to the caller untouched by the
/// proxy. `Skip` is not a failure: it tells the calling layer that an optional
/// capability is unavailable and the generic path should be used instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Optional capability not available; retry through the generic path.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// The connection is no longer usable.
    #[error("driver: bad connection")]
    BadConn,

    /// The caller's context was cancelled.
    #[error("context canceled")]
    Canceled,

    /// The caller's context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A non-default isolation level was requested from a backend that cannot honour it.
    #[error("sql: driver does not support non-default isolation level")]
    UnsupportedIsolationLevel,

    /// A read-only transaction was requested from a backend that cannot honour it.
    #[error("sql: driver does not support read-only transactions")]
    UnsupportedReadOnly,

    /// Named arguments were passed to a path that only accepts positional ones.
    #[error("sql: driver does not support the use of Named Parameters")]
    NamedParametersUnsupported,

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

impl DriverError {
    /// Build a backend error from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Whether this is the unsupported-capability sentinel.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

impl From<ContextError> for DriverError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Self::Canceled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
