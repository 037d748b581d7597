//! Human-readable line observer.
//!
//! ```text
//! Connect → CONN(1)
//! CONN(1) ► Prepare(INSERT|people|name=?) → STMT(2)
//! STMT(2) ► Exec(INSERT|people|name=?)
//! CONN(1) ► Begin → TX(3)
//! TX(3) ► Commit
//! ```
//!
//! Settings live behind an [`ArcSwap`] so a running observer can be
//! reconfigured without locking the notification path.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::config::ObserverConfig;
use crate::context::Context;
use crate::driver::{NamedValue, TxOptions, Value};
use crate::observer::{HookSet, Observer};
use crate::sequence::CorrelationId;

/// Destination for formatted lines.
pub trait LineSink: Send + Sync {
    fn print_line(&self, line: &str);
}

impl<S: LineSink + ?Sized> LineSink for Arc<S> {
    fn print_line(&self, line: &str) {
        (**self).print_line(line)
    }
}

/// Emits each line as an `info` event on the `sqlscope::sql` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn print_line(&self, line: &str) {
        tracing::info!(target: "sqlscope::sql", "{line}");
    }
}

/// Writes each line to stderr after a fixed prefix.
#[derive(Debug, Clone, Default)]
pub struct StderrSink {
    prefix: String,
}

impl StderrSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl LineSink for StderrSink {
    fn print_line(&self, line: &str) {
        eprintln!("{}{}", self.prefix, line);
    }
}

/// Keeps lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove and return everything captured so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl LineSink for MemorySink {
    fn print_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}

/// One line per notification.
pub struct DefaultObserver {
    sink: Box<dyn LineSink>,
    settings: ArcSwap<ObserverConfig>,
}

impl DefaultObserver {
    /// Observer with default settings: enabled, connects reported, closes not.
    pub fn new(sink: impl LineSink + 'static) -> Self {
        Self::with_config(sink, ObserverConfig::default())
    }

    pub fn with_config(sink: impl LineSink + 'static, config: ObserverConfig) -> Self {
        Self {
            sink: Box::new(sink),
            settings: ArcSwap::from_pointee(config),
        }
    }

    /// Current settings.
    pub fn config(&self) -> ObserverConfig {
        self.settings.load().as_ref().clone()
    }

    /// Replace the settings; takes effect for the next notification.
    pub fn apply(&self, config: ObserverConfig) {
        self.settings.store(Arc::new(config));
    }

    fn emit(&self, line: impl FnOnce() -> String) {
        if self.settings.load().enabled {
            self.sink.print_line(&line());
        }
    }

    fn emit_close(&self, line: impl FnOnce() -> String) {
        let settings = self.settings.load();
        if settings.enabled && settings.log_close {
            self.sink.print_line(&line());
        }
    }
}

impl Observer for DefaultObserver {
    fn hooks(&self) -> HookSet {
        HookSet::notifications()
    }

    fn connect(&self, _ctx: &Context, conn_id: CorrelationId) {
        let settings = self.settings.load();
        if settings.enabled && settings.log_connect {
            self.sink.print_line(&format!("Connect → CONN({conn_id})"));
        }
    }

    fn conn_begin(&self, _ctx: &Context, conn_id: CorrelationId, tx_id: CorrelationId, _opts: &TxOptions) {
        self.emit(|| format!("CONN({conn_id}) ► Begin → TX({tx_id})"));
    }

    fn conn_prepare(&self, _ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {
        self.emit(|| format!("CONN({conn_id}) ► Prepare({query}) → STMT({stmt_id})"));
    }

    fn conn_prepare_context(&self, _ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {
        self.emit(|| format!("CONN({conn_id}) ► Prepare({query}) → STMT({stmt_id})"));
    }

    fn conn_query(
        &self,
        _ctx: &Context,
        conn_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        _args: &[Value],
    ) {
        self.emit(|| format!("CONN({conn_id}) ► Query({query}) → ROWS({rows_id})"));
    }

    fn conn_query_context(
        &self,
        _ctx: &Context,
        conn_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        _args: &[NamedValue],
    ) {
        self.emit(|| format!("CONN({conn_id}) ► Query({query}) → ROWS({rows_id})"));
    }

    fn conn_exec(&self, _ctx: &Context, conn_id: CorrelationId, query: &str, _args: &[Value]) {
        self.emit(|| format!("CONN({conn_id}) ► Exec({query})"));
    }

    fn conn_exec_context(&self, _ctx: &Context, conn_id: CorrelationId, query: &str, _args: &[NamedValue]) {
        self.emit(|| format!("CONN({conn_id}) ► Exec({query})"));
    }

    fn conn_close(&self, _ctx: &Context, conn_id: CorrelationId) {
        self.emit_close(|| format!("CONN({conn_id}) ► Close"));
    }

    fn stmt_exec(&self, _ctx: &Context, stmt_id: CorrelationId, query: &str, _args: &[Value]) {
        self.emit(|| format!("STMT({stmt_id}) ► Exec({query})"));
    }

    fn stmt_exec_context(&self, _ctx: &Context, stmt_id: CorrelationId, query: &str, _args: &[NamedValue]) {
        self.emit(|| format!("STMT({stmt_id}) ► Exec({query})"));
    }

    fn stmt_query(
        &self,
        _ctx: &Context,
        stmt_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        _args: &[Value],
    ) {
        self.emit(|| format!("STMT({stmt_id}) ► Query({query}) → ROWS({rows_id})"));
    }

    fn stmt_query_context(
        &self,
        _ctx: &Context,
        stmt_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        _args: &[NamedValue],
    ) {
        self.emit(|| format!("STMT({stmt_id}) ► Query({query}) → ROWS({rows_id})"));
    }

    fn stmt_close(&self, _ctx: &Context, stmt_id: CorrelationId) {
        self.emit_close(|| format!("STMT({stmt_id}) ► Close"));
    }

    fn rows_close(&self, _ctx: &Context, rows_id: CorrelationId) {
        self.emit_close(|| format!("ROWS({rows_id}) ► Close"));
    }

    fn tx_commit(&self, _ctx: &Context, tx_id: CorrelationId) {
        self.emit(|| format!("TX({tx_id}) ► Commit"));
    }

    fn tx_rollback(&self, _ctx: &Context, tx_id: CorrelationId) {
        self.emit(|| format!("TX({tx_id}) ► Rollback"));
    }
}
