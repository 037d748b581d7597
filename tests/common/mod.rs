//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sqlscope::context::Context;
use sqlscope::driver::{Conn, Connector, DriverError, NamedValue, TxOptions, Value};
use sqlscope::memdb::{Capabilities, MemDriver};
use sqlscope::observer::{Hook, HookSet, Observer, TraceToken};
use sqlscope::proxy::{wrap, ProxyConnector};
use sqlscope::sequence::CorrelationId;
use sqlscope::timing::timing;

/// One observed callback, with raw IDs.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect { conn: u64 },
    ConnBegin { conn: u64, tx: u64, opts: TxOptions },
    ConnPrepare { conn: u64, stmt: u64, query: String },
    ConnPrepareContext { conn: u64, stmt: u64, query: String },
    ConnQuery { conn: u64, rows: u64, query: String, args: Vec<Value> },
    ConnQueryContext { conn: u64, rows: u64, query: String, args: Vec<NamedValue> },
    ConnExec { conn: u64, query: String, args: Vec<Value> },
    ConnExecContext { conn: u64, query: String, args: Vec<NamedValue> },
    ConnClose { conn: u64 },
    StmtExec { stmt: u64, query: String, args: Vec<Value> },
    StmtExecContext { stmt: u64, query: String, args: Vec<NamedValue> },
    StmtQuery { stmt: u64, rows: u64, query: String, args: Vec<Value> },
    StmtQueryContext { stmt: u64, rows: u64, query: String, args: Vec<NamedValue> },
    StmtClose { stmt: u64 },
    RowsClose { rows: u64 },
    TxCommit { tx: u64 },
    TxRollback { tx: u64 },
    TraceStart { hook: Hook, owner: u64, query: String },
    TraceDone { hook: Hook, rows: Option<u64>, failed: bool },
}

impl Event {
    pub fn is_close(&self) -> bool {
        matches!(
            self,
            Event::ConnClose { .. } | Event::StmtClose { .. } | Event::RowsClose { .. }
        )
    }
}

/// Observer that records every callback it declares in its hook set.
pub struct RecordingObserver {
    hooks: HookSet,
    events: Mutex<Vec<Event>>,
    timed: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::with_hooks(HookSet::notifications())
    }

    pub fn with_hooks(hooks: HookSet) -> Self {
        Self {
            hooks,
            events: Mutex::new(Vec::new()),
            timed: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Whether each notification so far carried a timing window.
    pub fn timed(&self) -> Vec<bool> {
        self.timed.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.timed.lock().unwrap().clear();
    }

    fn record(&self, ctx: &Context, event: Event) {
        self.timed.lock().unwrap().push(timing(ctx).is_some());
        self.events.lock().unwrap().push(event);
    }

    fn trace(&self, hook: Hook, owner: CorrelationId, query: &str) -> TraceToken {
        self.events.lock().unwrap().push(Event::TraceStart {
            hook,
            owner: owner.as_u64(),
            query: query.to_string(),
        });
        TraceToken::new(hook)
    }
}

impl Observer for RecordingObserver {
    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn connect(&self, ctx: &Context, conn_id: CorrelationId) {
        self.record(ctx, Event::Connect { conn: conn_id.as_u64() });
    }

    fn conn_begin(&self, ctx: &Context, conn_id: CorrelationId, tx_id: CorrelationId, opts: &TxOptions) {
        self.record(
            ctx,
            Event::ConnBegin {
                conn: conn_id.as_u64(),
                tx: tx_id.as_u64(),
                opts: *opts,
            },
        );
    }

    fn conn_prepare(&self, ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {
        self.record(
            ctx,
            Event::ConnPrepare {
                conn: conn_id.as_u64(),
                stmt: stmt_id.as_u64(),
                query: query.to_string(),
            },
        );
    }

    fn conn_prepare_context(&self, ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {
        self.record(
            ctx,
            Event::ConnPrepareContext {
                conn: conn_id.as_u64(),
                stmt: stmt_id.as_u64(),
                query: query.to_string(),
            },
        );
    }

    fn conn_query(&self, ctx: &Context, conn_id: CorrelationId, rows_id: CorrelationId, query: &str, args: &[Value]) {
        self.record(
            ctx,
            Event::ConnQuery {
                conn: conn_id.as_u64(),
                rows: rows_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn conn_query_context(
        &self,
        ctx: &Context,
        conn_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[NamedValue],
    ) {
        self.record(
            ctx,
            Event::ConnQueryContext {
                conn: conn_id.as_u64(),
                rows: rows_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn conn_exec(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[Value]) {
        self.record(
            ctx,
            Event::ConnExec {
                conn: conn_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn conn_exec_context(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[NamedValue]) {
        self.record(
            ctx,
            Event::ConnExecContext {
                conn: conn_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn conn_close(&self, ctx: &Context, conn_id: CorrelationId) {
        self.record(ctx, Event::ConnClose { conn: conn_id.as_u64() });
    }

    fn stmt_exec(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[Value]) {
        self.record(
            ctx,
            Event::StmtExec {
                stmt: stmt_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn stmt_exec_context(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[NamedValue]) {
        self.record(
            ctx,
            Event::StmtExecContext {
                stmt: stmt_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn stmt_query(&self, ctx: &Context, stmt_id: CorrelationId, rows_id: CorrelationId, query: &str, args: &[Value]) {
        self.record(
            ctx,
            Event::StmtQuery {
                stmt: stmt_id.as_u64(),
                rows: rows_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn stmt_query_context(
        &self,
        ctx: &Context,
        stmt_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[NamedValue],
    ) {
        self.record(
            ctx,
            Event::StmtQueryContext {
                stmt: stmt_id.as_u64(),
                rows: rows_id.as_u64(),
                query: query.to_string(),
                args: args.to_vec(),
            },
        );
    }

    fn stmt_close(&self, ctx: &Context, stmt_id: CorrelationId) {
        self.record(ctx, Event::StmtClose { stmt: stmt_id.as_u64() });
    }

    fn rows_close(&self, ctx: &Context, rows_id: CorrelationId) {
        self.record(ctx, Event::RowsClose { rows: rows_id.as_u64() });
    }

    fn tx_commit(&self, ctx: &Context, tx_id: CorrelationId) {
        self.record(ctx, Event::TxCommit { tx: tx_id.as_u64() });
    }

    fn tx_rollback(&self, ctx: &Context, tx_id: CorrelationId) {
        self.record(ctx, Event::TxRollback { tx: tx_id.as_u64() });
    }

    fn conn_query_trace(&self, _ctx: &Context, conn_id: CorrelationId, query: &str, _args: &[Value]) -> TraceToken {
        self.trace(Hook::ConnQueryTrace, conn_id, query)
    }

    fn conn_query_context_trace(
        &self,
        _ctx: &Context,
        conn_id: CorrelationId,
        query: &str,
        _args: &[NamedValue],
    ) -> TraceToken {
        self.trace(Hook::ConnQueryContextTrace, conn_id, query)
    }

    fn stmt_query_trace(&self, _ctx: &Context, stmt_id: CorrelationId, query: &str, _args: &[Value]) -> TraceToken {
        self.trace(Hook::StmtQueryTrace, stmt_id, query)
    }

    fn stmt_query_context_trace(
        &self,
        _ctx: &Context,
        stmt_id: CorrelationId,
        query: &str,
        _args: &[NamedValue],
    ) -> TraceToken {
        self.trace(Hook::StmtQueryContextTrace, stmt_id, query)
    }

    fn query_trace_done(&self, token: TraceToken, rows_id: Option<CorrelationId>, err: Option<&DriverError>) {
        let hook = token.downcast::<Hook>().expect("token minted by this observer");
        self.events.lock().unwrap().push(Event::TraceDone {
            hook,
            rows: rows_id.map(|id| id.as_u64()),
            failed: err.is_some(),
        });
    }
}

/// An in-memory backend wrapped with a recording observer.
pub struct Harness {
    pub backend: Arc<MemDriver>,
    pub observer: Arc<RecordingObserver>,
    pub proxy: ProxyConnector,
    pub database: String,
}

impl Harness {
    pub fn new(caps: Capabilities) -> Self {
        Self::with_observer(caps, RecordingObserver::new())
    }

    pub fn with_observer(caps: Capabilities, observer: RecordingObserver) -> Self {
        let backend = MemDriver::new(caps);
        let database = "harness".to_string();
        let observer = Arc::new(observer);
        let proxy = wrap(observer.clone(), backend.connector(&database));
        Self {
            backend,
            observer,
            proxy,
            database,
        }
    }

    /// A proxied connection.
    pub fn connect(&self) -> Box<dyn Conn> {
        self.proxy.connect(&Context::background()).unwrap()
    }

    /// A backend connection to the same database, bypassing the proxy.
    pub fn connect_raw(&self) -> Box<dyn Conn> {
        self.backend
            .connector(&self.database)
            .connect(&Context::background())
            .unwrap()
    }

    /// Run setup commands on an unobserved connection.
    pub fn seed(&self, commands: &[&str]) {
        let mut conn = self.connect_raw();
        for command in commands {
            let mut stmt = conn.prepare(command).unwrap();
            stmt.exec(&[]).unwrap();
            stmt.close().unwrap();
        }
        conn.close().unwrap();
    }
}

pub const CREATE_PEOPLE: &str = "CREATE|people|name=text,age=int";
pub const INSERT_PEOPLE: &str = "INSERT|people|name=?,age=?";
pub const SELECT_PEOPLE: &str = "SELECT|people|name,age";

pub fn person(name: &str, age: i64) -> Vec<Value> {
    vec![Value::from(name), Value::Int(age)]
}
