//! Metrics observer: counters and latency histograms for every operation.

use std::time::Instant;

use crate::context::Context;
use crate::driver::{DriverError, NamedValue, TxOptions, Value};
use crate::observability::metrics::{record_operation, record_query};
use crate::observer::{Hook, HookSet, Observer, TraceToken};
use crate::sequence::CorrelationId;
use crate::timing::timing;

/// State carried through a traced query.
struct QueryTrace {
    kind: Hook,
    started: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    pub fn new() -> Self {
        Self
    }

    fn record(&self, hook: Hook, ctx: &Context) {
        record_operation(hook, timing(ctx).map(|t| t.elapsed()));
    }

    fn start(&self, kind: Hook) -> TraceToken {
        TraceToken::new(QueryTrace {
            kind,
            started: Instant::now(),
        })
    }
}

impl Observer for MetricsObserver {
    fn hooks(&self) -> HookSet {
        HookSet::all()
    }

    fn connect(&self, ctx: &Context, _conn_id: CorrelationId) {
        self.record(Hook::Connect, ctx);
    }

    fn conn_begin(&self, ctx: &Context, _conn_id: CorrelationId, _tx_id: CorrelationId, _opts: &TxOptions) {
        self.record(Hook::ConnBegin, ctx);
    }

    fn conn_prepare(&self, ctx: &Context, _conn_id: CorrelationId, _stmt_id: CorrelationId, _query: &str) {
        self.record(Hook::ConnPrepare, ctx);
    }

    fn conn_prepare_context(&self, ctx: &Context, _conn_id: CorrelationId, _stmt_id: CorrelationId, _query: &str) {
        self.record(Hook::ConnPrepareContext, ctx);
    }

    fn conn_query(&self, ctx: &Context, _: CorrelationId, _: CorrelationId, _: &str, _: &[Value]) {
        self.record(Hook::ConnQuery, ctx);
    }

    fn conn_query_context(&self, ctx: &Context, _: CorrelationId, _: CorrelationId, _: &str, _: &[NamedValue]) {
        self.record(Hook::ConnQueryContext, ctx);
    }

    fn conn_exec(&self, ctx: &Context, _conn_id: CorrelationId, _query: &str, _args: &[Value]) {
        self.record(Hook::ConnExec, ctx);
    }

    fn conn_exec_context(&self, ctx: &Context, _conn_id: CorrelationId, _query: &str, _args: &[NamedValue]) {
        self.record(Hook::ConnExecContext, ctx);
    }

    fn conn_close(&self, ctx: &Context, _conn_id: CorrelationId) {
        self.record(Hook::ConnClose, ctx);
    }

    fn stmt_exec(&self, ctx: &Context, _stmt_id: CorrelationId, _query: &str, _args: &[Value]) {
        self.record(Hook::StmtExec, ctx);
    }

    fn stmt_exec_context(&self, ctx: &Context, _stmt_id: CorrelationId, _query: &str, _args: &[NamedValue]) {
        self.record(Hook::StmtExecContext, ctx);
    }

    fn stmt_query(&self, ctx: &Context, _: CorrelationId, _: CorrelationId, _: &str, _: &[Value]) {
        self.record(Hook::StmtQuery, ctx);
    }

    fn stmt_query_context(&self, ctx: &Context, _: CorrelationId, _: CorrelationId, _: &str, _: &[NamedValue]) {
        self.record(Hook::StmtQueryContext, ctx);
    }

    fn stmt_close(&self, ctx: &Context, _stmt_id: CorrelationId) {
        self.record(Hook::StmtClose, ctx);
    }

    fn rows_close(&self, ctx: &Context, _rows_id: CorrelationId) {
        self.record(Hook::RowsClose, ctx);
    }

    fn tx_commit(&self, ctx: &Context, _tx_id: CorrelationId) {
        self.record(Hook::TxCommit, ctx);
    }

    fn tx_rollback(&self, ctx: &Context, _tx_id: CorrelationId) {
        self.record(Hook::TxRollback, ctx);
    }

    fn conn_query_trace(&self, _ctx: &Context, _conn_id: CorrelationId, _query: &str, _args: &[Value]) -> TraceToken {
        self.start(Hook::ConnQuery)
    }

    fn conn_query_context_trace(
        &self,
        _ctx: &Context,
        _conn_id: CorrelationId,
        _query: &str,
        _args: &[NamedValue],
    ) -> TraceToken {
        self.start(Hook::ConnQueryContext)
    }

    fn stmt_query_trace(&self, _ctx: &Context, _stmt_id: CorrelationId, _query: &str, _args: &[Value]) -> TraceToken {
        self.start(Hook::StmtQuery)
    }

    fn stmt_query_context_trace(
        &self,
        _ctx: &Context,
        _stmt_id: CorrelationId,
        _query: &str,
        _args: &[NamedValue],
    ) -> TraceToken {
        self.start(Hook::StmtQueryContext)
    }

    fn query_trace_done(&self, token: TraceToken, _rows_id: Option<CorrelationId>, err: Option<&DriverError>) {
        let Some(trace) = token.downcast::<QueryTrace>() else {
            return;
        };
        let outcome = if err.is_some() { "error" } else { "ok" };
        record_query(trace.kind.name(), outcome, trace.started.elapsed());
    }
}
