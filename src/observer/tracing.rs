//! Structured logging observer.
//!
//! Each notification becomes one `tracing` event with the correlation IDs,
//! query text and JSON-rendered arguments as fields. Levels are configurable
//! per operation group.

use serde::Serialize;
use tracing::Level;

use crate::config::{StructuredConfig, ValidationError};
use crate::config::validation::parse_level;
use crate::context::Context;
use crate::driver::{NamedValue, TxOptions, Value};
use crate::observer::{HookSet, Observer};
use crate::sequence::CorrelationId;
use crate::timing::timing;

/// Emit an event at a level chosen at runtime.
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!(target: "sqlscope::sql", $($arg)+)
        } else if level == Level::WARN {
            tracing::warn!(target: "sqlscope::sql", $($arg)+)
        } else if level == Level::INFO {
            tracing::info!(target: "sqlscope::sql", $($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!(target: "sqlscope::sql", $($arg)+)
        } else {
            tracing::trace!(target: "sqlscope::sql", $($arg)+)
        }
    }};
}

/// Event level per operation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingLevels {
    pub connect: Level,
    pub prepare: Level,
    pub query: Level,
    pub exec: Level,
    pub close: Level,
    pub tx: Level,
}

impl Default for TracingLevels {
    fn default() -> Self {
        Self {
            connect: Level::DEBUG,
            prepare: Level::DEBUG,
            query: Level::INFO,
            exec: Level::INFO,
            close: Level::DEBUG,
            tx: Level::INFO,
        }
    }
}

impl TracingLevels {
    pub fn from_config(config: &StructuredConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            connect: parse_level("structured.connect", &config.connect)?,
            prepare: parse_level("structured.prepare", &config.prepare)?,
            query: parse_level("structured.query", &config.query)?,
            exec: parse_level("structured.exec", &config.exec)?,
            close: parse_level("structured.close", &config.close)?,
            tx: parse_level("structured.tx", &config.tx)?,
        })
    }
}

fn render_args<T: Serialize>(args: &[T]) -> String {
    serde_json::to_string(args).unwrap_or_else(|e| format!("<unrenderable: {e}>"))
}

/// Observer that forwards every notification to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    levels: TracingLevels,
}

impl TracingObserver {
    pub fn new(levels: TracingLevels) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> TracingLevels {
        self.levels
    }
}

impl Observer for TracingObserver {
    fn hooks(&self) -> HookSet {
        HookSet::notifications()
    }

    fn connect(&self, ctx: &Context, conn_id: CorrelationId) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(self.levels.connect, conn_id = %conn_id, elapsed = ?elapsed, "DB Connect");
    }

    fn conn_begin(&self, ctx: &Context, conn_id: CorrelationId, tx_id: CorrelationId, opts: &TxOptions) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.tx,
            conn_id = %conn_id,
            tx_id = %tx_id,
            isolation = ?opts.isolation,
            read_only = opts.read_only,
            elapsed = ?elapsed,
            "CONN Begin"
        );
    }

    fn conn_prepare(&self, ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.prepare,
            conn_id = %conn_id,
            stmt_id = %stmt_id,
            query = %query,
            elapsed = ?elapsed,
            "CONN Prepare"
        );
    }

    fn conn_prepare_context(&self, ctx: &Context, conn_id: CorrelationId, stmt_id: CorrelationId, query: &str) {
        self.conn_prepare(ctx, conn_id, stmt_id, query);
    }

    fn conn_query(
        &self,
        ctx: &Context,
        conn_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[Value],
    ) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.query,
            conn_id = %conn_id,
            rows_id = %rows_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "CONN Query"
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
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.query,
            conn_id = %conn_id,
            rows_id = %rows_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "CONN Query"
        );
    }

    fn conn_exec(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[Value]) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.exec,
            conn_id = %conn_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "CONN Exec"
        );
    }

    fn conn_exec_context(&self, ctx: &Context, conn_id: CorrelationId, query: &str, args: &[NamedValue]) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.exec,
            conn_id = %conn_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "CONN Exec"
        );
    }

    fn conn_close(&self, _ctx: &Context, conn_id: CorrelationId) {
        event_at!(self.levels.close, conn_id = %conn_id, "CONN Close");
    }

    fn stmt_exec(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[Value]) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.exec,
            stmt_id = %stmt_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "STMT Exec"
        );
    }

    fn stmt_exec_context(&self, ctx: &Context, stmt_id: CorrelationId, query: &str, args: &[NamedValue]) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.exec,
            stmt_id = %stmt_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "STMT Exec"
        );
    }

    fn stmt_query(
        &self,
        ctx: &Context,
        stmt_id: CorrelationId,
        rows_id: CorrelationId,
        query: &str,
        args: &[Value],
    ) {
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.query,
            stmt_id = %stmt_id,
            rows_id = %rows_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "STMT Query"
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
        let elapsed = timing(ctx).map(|t| t.elapsed());
        event_at!(
            self.levels.query,
            stmt_id = %stmt_id,
            rows_id = %rows_id,
            query = %query,
            args = %render_args(args),
            elapsed = ?elapsed,
            "STMT Query"
        );
    }

    fn stmt_close(&self, _ctx: &Context, stmt_id: CorrelationId) {
        event_at!(self.levels.close, stmt_id = %stmt_id, "STMT Close");
    }

    fn rows_close(&self, _ctx: &Context, rows_id: CorrelationId) {
        event_at!(self.levels.close, rows_id = %rows_id, "ROWS Close");
    }

    fn tx_commit(&self, _ctx: &Context, tx_id: CorrelationId) {
        event_at!(self.levels.tx, tx_id = %tx_id, "TX Commit");
    }

    fn tx_rollback(&self, _ctx: &Context, tx_id: CorrelationId) {
        event_at!(self.levels.tx, tx_id = %tx_id, "TX Rollback");
    }
}
