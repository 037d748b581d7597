//! Request-scoped context.
//!
//! # Responsibilities
//! - Carry cooperative cancellation and deadlines from the caller
//! - Carry typed request-scoped values (timing, caller metadata)
//!
//! Deriving a context never changes the one it was derived from: values are
//! copy-on-write and cancellation signals are inherited by children.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Extensions;
use thiserror::Error;
use tokio::sync::watch;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation, deadline and values for one call chain.
#[derive(Debug, Clone, Default)]
pub struct Context {
    signals: Vec<watch::Receiver<bool>>,
    deadline: Option<Instant>,
    values: Arc<Extensions>,
}

impl Context {
    /// An empty context that is never done.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that is cancelled when the returned handle fires.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut child = self.clone();
        child.signals.push(rx);
        (child, CancelHandle { tx: Arc::new(tx) })
    }

    /// Derive a context that expires at `deadline` (or earlier if the parent does).
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let mut child = self.clone();
        child.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        child
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context carrying `value`, replacing any value of the same type.
    pub fn with_value<T: Clone + Send + Sync + 'static>(&self, value: T) -> Context {
        let mut values = (*self.values).clone();
        values.insert(value);
        Context {
            signals: self.signals.clone(),
            deadline: self.deadline,
            values: Arc::new(values),
        }
    }

    /// Look up a value by type.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context is cancelled or past its deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

/// Cancels every context derived from the one it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}
