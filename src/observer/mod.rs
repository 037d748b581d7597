//! Observer contract.
//!
//! # Data Flow
//! ```text
//! proxy call succeeds
//!     → Observer::hooks() probed for the matching Hook
//!     → hook invoked with correlation IDs, query text, arguments
//!
//! proxy query with a trace hook present
//!     → *_trace(...) before the backend call → TraceToken
//!     → backend call
//!     → query_trace_done(token, rows_id, error)
//! ```
//!
//! An observer implements any subset of hooks. It lists them in
//! [`Observer::hooks`]; hooks left out of the set are never called.
//!
//! Adapters:
//! - [`default::DefaultObserver`]: one human-readable line per notification
//! - [`tracing::TracingObserver`]: leveled structured events
//! - [`metrics::MetricsObserver`]: counters and latency histograms

pub mod default;
pub mod metrics;
pub mod tracing;

use std::any::Any;

use crate::context::Context;
use crate::driver::{DriverError, NamedValue, TxOptions, Value};
use crate::sequence::CorrelationId;

pub use default::{DefaultObserver, LineSink, MemorySink, StderrSink, TracingSink};
pub use self::metrics::MetricsObserver;
pub use self::tracing::{TracingLevels, TracingObserver};

/// One observable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Connect,
    ConnBegin,
    ConnPrepare,
    ConnPrepareContext,
    ConnQuery,
    ConnQueryContext,
    ConnExec,
    ConnExecContext,
    ConnClose,
    StmtExec,
    StmtExecContext,
    StmtQuery,
    StmtQueryContext,
    StmtClose,
    RowsClose,
    TxCommit,
    TxRollback,
    ConnQueryTrace,
    ConnQueryContextTrace,
    StmtQueryTrace,
    StmtQueryContextTrace,
}

impl Hook {
    pub const ALL: [Hook; 21] = [
        Hook::Connect,
        Hook::ConnBegin,
        Hook::ConnPrepare,
        Hook::ConnPrepareContext,
        Hook::ConnQuery,
        Hook::ConnQueryContext,
        Hook::ConnExec,
        Hook::ConnExecContext,
        Hook::ConnClose,
        Hook::StmtExec,
        Hook::StmtExecContext,
        Hook::StmtQuery,
        Hook::StmtQueryContext,
        Hook::StmtClose,
        Hook::RowsClose,
        Hook::TxCommit,
        Hook::TxRollback,
        Hook::ConnQueryTrace,
        Hook::ConnQueryContextTrace,
        Hook::StmtQueryTrace,
        Hook::StmtQueryContextTrace,
    ];

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Whether this is a before/after trace hook rather than a notification.
    pub const fn is_trace(self) -> bool {
        matches!(
            self,
            Hook::ConnQueryTrace
                | Hook::ConnQueryContextTrace
                | Hook::StmtQueryTrace
                | Hook::StmtQueryContextTrace
        )
    }

    /// Stable snake_case name, used as a metric label.
    pub const fn name(self) -> &'static str {
        match self {
            Hook::Connect => "connect",
            Hook::ConnBegin => "conn_begin",
            Hook::ConnPrepare => "conn_prepare",
            Hook::ConnPrepareContext => "conn_prepare_context",
            Hook::ConnQuery => "conn_query",
            Hook::ConnQueryContext => "conn_query_context",
            Hook::ConnExec => "conn_exec",
            Hook::ConnExecContext => "conn_exec_context",
            Hook::ConnClose => "conn_close",
            Hook::StmtExec => "stmt_exec",
            Hook::StmtExecContext => "stmt_exec_context",
            Hook::StmtQuery => "stmt_query",
            Hook::StmtQueryContext => "stmt_query_context",
            Hook::StmtClose => "stmt_close",
            Hook::RowsClose => "rows_close",
            Hook::TxCommit => "tx_commit",
            Hook::TxRollback => "tx_rollback",
            Hook::ConnQueryTrace => "conn_query_trace",
            Hook::ConnQueryContextTrace => "conn_query_context_trace",
            Hook::StmtQueryTrace => "stmt_query_trace",
            Hook::StmtQueryContextTrace => "stmt_query_context_trace",
        }
    }
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of hooks an observer implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HookSet(u32);

impl HookSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every plain notification hook, no trace hooks.
    pub const fn notifications() -> Self {
        let mut set = 0;
        let mut i = 0;
        while i < Hook::ALL.len() {
            if !Hook::ALL[i].is_trace() {
                set |= Hook::ALL[i].bit();
            }
            i += 1;
        }
        Self(set)
    }

    /// The four query trace hooks.
    pub const fn traces() -> Self {
        Self(
            Hook::ConnQueryTrace.bit()
                | Hook::ConnQueryContextTrace.bit()
                | Hook::StmtQueryTrace.bit()
                | Hook::StmtQueryContextTrace.bit(),
        )
    }

    pub const fn all() -> Self {
        Self(Self::notifications().0 | Self::traces().0)
    }

    pub const fn with(self, hook: Hook) -> Self {
        Self(self.0 | hook.bit())
    }

    pub const fn without(self, hook: Hook) -> Self {
        Self(self.0 & !hook.bit())
    }

    pub const fn union(self, other: HookSet) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, hook: Hook) -> bool {
        self.0 & hook.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Hook> {
        Hook::ALL.into_iter().filter(move |h| self.contains(*h))
    }
}

impl FromIterator<Hook> for HookSet {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        iter.into_iter().fold(HookSet::empty(), HookSet::with)
    }
}

/// State an observer hands out when a traced query starts and gets back when it ends.
#[derive(Default)]
pub struct TraceToken(Option<Box<dyn Any + Send>>);

impl TraceToken {
    /// A token carrying nothing.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send>(state: T) -> Self {
        Self(Some(Box::new(state)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Recover the state if it has type `T`.
    pub fn downcast<T: Any>(self) -> Option<T> {
        self.0?.downcast::<T>().ok().map(|state| *state)
    }
}

impl std::fmt::Debug for TraceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TraceToken")
            .field(&if self.is_empty() { "empty" } else { "state" })
            .finish()
    }
}

/// Receiver of operation notifications.
///
/// All methods are only invoked when the backend call succeeded, except the
/// trace pair which brackets the call. Every method defaults to a no-op; the
/// proxy only calls the ones listed in [`Observer::hooks`].
#[allow(unused_variables)]
pub trait Observer: Send + Sync {
    /// The hooks this observer implements.
    fn hooks(&self) -> HookSet;

    fn connect(&self, ctx: &Context, conn_id: CorrelationId) {}

    fn conn_begin(&self, ctx: &Context, conn_id: CorrelationId, tx_id: CorrelationId, opts: &TxOptions) {}

    fn conn_prepare(&self, ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {}

    fn conn_prepare_context(
        &self,
        ctx: &Context,
        conn_id: CorrelationId,
        stmt_id: CorrelationId,
        query: &str,
    ) {
    }

    fn conn_query(
        &self,
        ctx: &Context,
        conn_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[Value],
    ) {
    }

    fn conn_query_context(
        &self,
        ctx: &Context,
        conn_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[NamedValue],
    ) {
    }

    fn conn_exec(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[Value]) {}

    fn conn_exec_context(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[NamedValue]) {}

    fn conn_close(&self, ctx: &Context, conn_id: CorrelationId) {}

    fn stmt_exec(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[Value]) {}

    fn stmt_exec_context(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[NamedValue]) {}

    fn stmt_query(
        &self,
        ctx: &Context,
        stmt_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[Value],
    ) {
    }

    fn stmt_query_context(
        &self,
        ctx: &Context,
        stmt_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[NamedValue],
    ) {
    }

    fn stmt_close(&self, ctx: &Context, stmt_id: CorrelationId) {}

    fn rows_close(&self, ctx: &Context, rows_id: CorrelationId) {}

    fn tx_commit(&self, ctx: &Context, tx_id: CorrelationId) {}

    fn tx_rollback(&self, ctx: &Context, tx_id: CorrelationId) {}

    fn conn_query_trace(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[Value]) -> TraceToken {
        TraceToken::none()
    }

    fn conn_query_context_trace(
        &self,
        ctx: &Context,
        conn_id: CorrelationId,
        query: &str,
        args: &[NamedValue],
    ) -> TraceToken {
        TraceToken::none()
    }

    fn stmt_query_trace(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[Value]) -> TraceToken {
        TraceToken::none()
    }

    fn stmt_query_context_trace(
        &self,
        ctx: &Context,
        stmt_id: CorrelationId,
        query: &str,
        args: &[NamedValue],
    ) -> TraceToken {
        TraceToken::none()
    }

    /// Completes a trace started by one of the `*_trace` hooks.
    ///
    /// `rows_id` is set when the query succeeded, `err` when it failed.
    fn query_trace_done(&self, token: TraceToken, rows_id: Option<CorrelationId>, err: Option<&DriverError>) {}
}

/// An observer that implements no hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn hooks(&self) -> HookSet {
        HookSet::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_set_partitions() {
        let notifications = HookSet::notifications();
        let traces = HookSet::traces();
        assert_eq!(notifications.iter().count(), 17);
        assert_eq!(traces.iter().count(), 4);
        assert!(notifications.iter().all(|h| !traces.contains(h)));
        assert_eq!(notifications.union(traces), HookSet::all());
    }

    #[test]
    fn test_hook_set_builders() {
        let set: HookSet = [Hook::Connect, Hook::StmtClose].into_iter().collect();
        assert!(set.contains(Hook::Connect));
        assert!(set.contains(Hook::StmtClose));
        assert!(!set.contains(Hook::ConnClose));
        assert!(set.without(Hook::Connect).without(Hook::StmtClose).is_empty());
    }

    #[test]
    fn test_trace_token_downcast() {
        let token = TraceToken::new(17_u32);
        assert_eq!(token.downcast::<u32>(), Some(17));
        assert_eq!(TraceToken::new("x").downcast::<u32>(), None);
        assert!(TraceToken::none().downcast::<u32>().is_none());
    }

    #[test]
    fn test_noop_observer_has_no_hooks() {
        assert!(NoopObserver.hooks().is_empty());
    }
}
