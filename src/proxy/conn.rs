//! Connection wrapper.

use std::time::Instant;

use tracing::{debug, trace};

use crate::context::Context;
use crate::driver::{
    Conn, ConnBeginTx, ConnPrepareContext, DriverError, DriverResult, ExecResult, Execer,
    ExecerContext, IsolationLevel, NamedValue, NamedValueChecker, Pinger, Queryer,
    QueryerContext, Rows, SessionResetter, Stmt, Tx, TxOptions, Validator, Value,
};
use crate::observer::Hook;
use crate::proxy::{timed, Instrumentation, ProxyRows, ProxyStmt, ProxyTx};
use crate::sequence::CorrelationId;

/// A backend connection reported under one CONN ID.
pub struct ProxyConn {
    id: CorrelationId,
    conn: Box<dyn Conn>,
    inst: Instrumentation,
}

impl ProxyConn {
    pub(crate) fn new(id: CorrelationId, conn: Box<dyn Conn>, inst: Instrumentation) -> Self {
        Self { id, conn, inst }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    fn wrap_stmt(&self, stmt_id: CorrelationId, query: &str, stmt: Box<dyn Stmt>) -> Box<dyn Stmt> {
        Box::new(ProxyStmt::new(stmt_id, query.to_string(), stmt, self.inst.clone()))
    }

    fn wrap_tx(&self, tx_id: CorrelationId, tx: Box<dyn Tx>) -> Box<dyn Tx> {
        Box::new(ProxyTx::new(tx_id, tx, self.inst.clone()))
    }

    fn wrap_rows(&self, rows_id: CorrelationId, rows: Box<dyn Rows>) -> Box<dyn Rows> {
        Box::new(ProxyRows::new(rows_id, rows, self.inst.clone()))
    }

    fn begin_plain(&mut self, ctx: &Context, opts: TxOptions) -> DriverResult<Box<dyn Tx>> {
        let started = Instant::now();
        let tx = self.conn.begin()?;

        let (conn_id, tx_id) = (self.id, self.inst.next_id());
        self.inst
            .notify(Hook::ConnBegin, |o| o.conn_begin(&timed(ctx, started), conn_id, tx_id, &opts));
        Ok(self.wrap_tx(tx_id, tx))
    }

    fn prepare_plain(&mut self, query: &str) -> DriverResult<(CorrelationId, Box<dyn Stmt>)> {
        let started = Instant::now();
        let stmt = self.conn.prepare(query)?;

        let (conn_id, stmt_id) = (self.id, self.inst.next_id());
        self.inst.notify(Hook::ConnPrepare, |o| {
            o.conn_prepare(&timed(&Context::background(), started), conn_id, stmt_id, query)
        });
        Ok((stmt_id, stmt))
    }
}

impl Conn for ProxyConn {
    fn prepare(&mut self, query: &str) -> DriverResult<Box<dyn Stmt>> {
        let (stmt_id, stmt) = self.prepare_plain(query)?;
        Ok(self.wrap_stmt(stmt_id, query, stmt))
    }

    fn begin(&mut self) -> DriverResult<Box<dyn Tx>> {
        self.begin_plain(&Context::background(), TxOptions::default())
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        let ProxyConn { id, conn, inst } = *self;
        let started = Instant::now();
        conn.close()?;

        inst.notify(Hook::ConnClose, |o| o.conn_close(&timed(&Context::background(), started), id));
        Ok(())
    }

    fn as_prepare_context(&mut self) -> Option<&mut dyn ConnPrepareContext> {
        Some(self)
    }

    fn as_begin_tx(&mut self) -> Option<&mut dyn ConnBeginTx> {
        Some(self)
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        if self.conn.as_execer().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_execer_context(&mut self) -> Option<&mut dyn ExecerContext> {
        if self.conn.as_execer_context().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        if self.conn.as_queryer().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
        if self.conn.as_queryer_context().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_session_resetter(&mut self) -> Option<&mut dyn SessionResetter> {
        if self.conn.as_session_resetter().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_named_value_checker(&mut self) -> Option<&mut dyn NamedValueChecker> {
        if self.conn.as_named_value_checker().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_pinger(&mut self) -> Option<&mut dyn Pinger> {
        if self.conn.as_pinger().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.conn.as_validator().map(|_| self as &dyn Validator)
    }
}

impl ConnPrepareContext for ProxyConn {
    fn prepare_context(&mut self, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>> {
        if let Some(backend) = self.conn.as_prepare_context() {
            let started = Instant::now();
            let stmt = backend.prepare_context(ctx, query)?;

            let (conn_id, stmt_id) = (self.id, self.inst.next_id());
            self.inst.notify(Hook::ConnPrepareContext, |o| {
                o.conn_prepare_context(&timed(ctx, started), conn_id, stmt_id, query)
            });
            return Ok(self.wrap_stmt(stmt_id, query, stmt));
        }

        trace!(conn_id = %self.id, "prepare_context fallback to prepare");
        let started = Instant::now();
        let stmt = self.conn.prepare(query)?;
        if let Some(err) = ctx.err() {
            debug!(conn_id = %self.id, error = %err, "context done after prepare, closing statement");
            if let Err(close_err) = stmt.close() {
                debug!(conn_id = %self.id, error = %close_err, "closing abandoned statement failed");
            }
            return Err(err.into());
        }

        let (conn_id, stmt_id) = (self.id, self.inst.next_id());
        self.inst.notify(Hook::ConnPrepare, |o| {
            o.conn_prepare(&timed(ctx, started), conn_id, stmt_id, query)
        });
        Ok(self.wrap_stmt(stmt_id, query, stmt))
    }
}

impl ConnBeginTx for ProxyConn {
    fn begin_tx(&mut self, ctx: &Context, opts: TxOptions) -> DriverResult<Box<dyn Tx>> {
        if let Some(backend) = self.conn.as_begin_tx() {
            let started = Instant::now();
            let tx = backend.begin_tx(ctx, opts)?;

            let (conn_id, tx_id) = (self.id, self.inst.next_id());
            self.inst
                .notify(Hook::ConnBegin, |o| o.conn_begin(&timed(ctx, started), conn_id, tx_id, &opts));
            return Ok(self.wrap_tx(tx_id, tx));
        }

        if opts.isolation != IsolationLevel::Default {
            return Err(DriverError::UnsupportedIsolationLevel);
        }
        if opts.read_only {
            return Err(DriverError::UnsupportedReadOnly);
        }
        trace!(conn_id = %self.id, "begin_tx fallback to begin");
        self.begin_plain(ctx, opts)
    }
}

impl Execer for ProxyConn {
    fn exec(&mut self, query: &str, args: &[Value]) -> DriverResult<ExecResult> {
        let Some(backend) = self.conn.as_execer() else {
            return Err(DriverError::Skip);
        };
        let started = Instant::now();
        let result = backend.exec(query, args)?;

        let conn_id = self.id;
        self.inst.notify(Hook::ConnExec, |o| {
            o.conn_exec(&timed(&Context::background(), started), conn_id, query, args)
        });
        Ok(result)
    }
}

impl ExecerContext for ProxyConn {
    fn exec_context(&mut self, ctx: &Context, query: &str, args: &[NamedValue]) -> DriverResult<ExecResult> {
        let Some(backend) = self.conn.as_execer_context() else {
            return Err(DriverError::Skip);
        };
        let started = Instant::now();
        let result = backend.exec_context(ctx, query, args)?;

        let conn_id = self.id;
        self.inst.notify(Hook::ConnExecContext, |o| {
            o.conn_exec_context(&timed(ctx, started), conn_id, query, args)
        });
        Ok(result)
    }
}

impl Queryer for ProxyConn {
    fn query(&mut self, query: &str, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        let conn_id = self.id;
        let Some(backend) = self.conn.as_queryer() else {
            return Err(DriverError::Skip);
        };
        let ctx = Context::background();
        let token = self
            .inst
            .start_trace(Hook::ConnQueryTrace, |o| o.conn_query_trace(&ctx, conn_id, query, args));

        let started = Instant::now();
        let result = backend.query(query, args);
        let (rows_id, rows) = self.inst.complete_query(token, result)?;

        self.inst.notify(Hook::ConnQuery, |o| {
            o.conn_query(&timed(&ctx, started), conn_id, rows_id, query, args)
        });
        Ok(self.wrap_rows(rows_id, rows))
    }
}

impl QueryerContext for ProxyConn {
    fn query_context(&mut self, ctx: &Context, query: &str, args: &[NamedValue]) -> DriverResult<Box<dyn Rows>> {
        let conn_id = self.id;
        let Some(backend) = self.conn.as_queryer_context() else {
            return Err(DriverError::Skip);
        };
        let token = self.inst.start_trace(Hook::ConnQueryContextTrace, |o| {
            o.conn_query_context_trace(ctx, conn_id, query, args)
        });

        let started = Instant::now();
        let result = backend.query_context(ctx, query, args);
        let (rows_id, rows) = self.inst.complete_query(token, result)?;

        self.inst.notify(Hook::ConnQueryContext, |o| {
            o.conn_query_context(&timed(ctx, started), conn_id, rows_id, query, args)
        });
        Ok(self.wrap_rows(rows_id, rows))
    }
}

impl SessionResetter for ProxyConn {
    fn reset_session(&mut self, ctx: &Context) -> DriverResult<()> {
        match self.conn.as_session_resetter() {
            Some(backend) => backend.reset_session(ctx),
            None => Ok(()),
        }
    }
}

impl NamedValueChecker for ProxyConn {
    fn check_named_value(&mut self, value: &mut NamedValue) -> DriverResult<()> {
        match self.conn.as_named_value_checker() {
            Some(backend) => backend.check_named_value(value),
            None => Err(DriverError::Skip),
        }
    }
}

impl Pinger for ProxyConn {
    fn ping(&mut self, ctx: &Context) -> DriverResult<()> {
        match self.conn.as_pinger() {
            Some(backend) => backend.ping(ctx),
            None => Err(DriverError::Skip),
        }
    }
}

impl Validator for ProxyConn {
    fn is_valid(&self) -> bool {
        self.conn.as_validator().map_or(true, |v| v.is_valid())
    }
}
