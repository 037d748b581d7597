//! Prepared statement wrapper.

use std::time::Instant;

use tracing::trace;

use crate::context::Context;
use crate::driver::{
    to_values, DriverError, DriverResult, ExecResult, NamedValue, NamedValueChecker, Rows, Stmt,
    StmtExecContext, StmtQueryContext, Value,
};
use crate::observer::Hook;
use crate::proxy::{timed, Instrumentation, ProxyRows};
use crate::sequence::CorrelationId;

/// A backend statement reported under one STMT ID, remembering the text it was prepared from.
pub struct ProxyStmt {
    id: CorrelationId,
    query: String,
    stmt: Box<dyn Stmt>,
    inst: Instrumentation,
}

impl ProxyStmt {
    pub(crate) fn new(id: CorrelationId, query: String, stmt: Box<dyn Stmt>, inst: Instrumentation) -> Self {
        Self { id, query, stmt, inst }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn query_text(&self) -> &str {
        &self.query
    }

    fn wrap_rows(&self, rows_id: CorrelationId, rows: Box<dyn Rows>) -> Box<dyn Rows> {
        Box::new(ProxyRows::new(rows_id, rows, self.inst.clone()))
    }
}

impl Stmt for ProxyStmt {
    fn close(self: Box<Self>) -> DriverResult<()> {
        let ProxyStmt { id, stmt, inst, .. } = *self;
        let started = Instant::now();
        stmt.close()?;

        inst.notify(Hook::StmtClose, |o| o.stmt_close(&timed(&Context::background(), started), id));
        Ok(())
    }

    fn num_input(&self) -> Option<usize> {
        self.stmt.num_input()
    }

    fn exec(&mut self, args: &[Value]) -> DriverResult<ExecResult> {
        let started = Instant::now();
        let result = self.stmt.exec(args)?;

        let (stmt_id, query) = (self.id, self.query.as_str());
        self.inst.notify(Hook::StmtExec, |o| {
            o.stmt_exec(&timed(&Context::background(), started), stmt_id, query, args)
        });
        Ok(result)
    }

    fn query(&mut self, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        let ctx = Context::background();
        let (stmt_id, query) = (self.id, self.query.as_str());
        let token = self
            .inst
            .start_trace(Hook::StmtQueryTrace, |o| o.stmt_query_trace(&ctx, stmt_id, query, args));

        let started = Instant::now();
        let result = self.stmt.query(args);
        let (rows_id, rows) = self.inst.complete_query(token, result)?;

        self.inst.notify(Hook::StmtQuery, |o| {
            o.stmt_query(&timed(&ctx, started), stmt_id, rows_id, query, args)
        });
        Ok(self.wrap_rows(rows_id, rows))
    }

    fn as_exec_context(&mut self) -> Option<&mut dyn StmtExecContext> {
        Some(self)
    }

    fn as_query_context(&mut self) -> Option<&mut dyn StmtQueryContext> {
        Some(self)
    }

    fn as_named_value_checker(&mut self) -> Option<&mut dyn NamedValueChecker> {
        if self.stmt.as_named_value_checker().is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl StmtExecContext for ProxyStmt {
    fn exec_context(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult> {
        if let Some(backend) = self.stmt.as_exec_context() {
            let started = Instant::now();
            let result = backend.exec_context(ctx, args)?;

            let (stmt_id, query) = (self.id, self.query.as_str());
            self.inst.notify(Hook::StmtExecContext, |o| {
                o.stmt_exec_context(&timed(ctx, started), stmt_id, query, args)
            });
            return Ok(result);
        }

        let values = to_values(args)?;
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        trace!(stmt_id = %self.id, "exec_context fallback to exec");
        self.exec(&values)
    }
}

impl StmtQueryContext for ProxyStmt {
    fn query_context(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<Box<dyn Rows>> {
        let (stmt_id, query) = (self.id, self.query.as_str());
        if let Some(backend) = self.stmt.as_query_context() {
            let token = self.inst.start_trace(Hook::StmtQueryContextTrace, |o| {
                o.stmt_query_context_trace(ctx, stmt_id, query, args)
            });

            let started = Instant::now();
            let result = backend.query_context(ctx, args);
            let (rows_id, rows) = self.inst.complete_query(token, result)?;

            self.inst.notify(Hook::StmtQueryContext, |o| {
                o.stmt_query_context(&timed(ctx, started), stmt_id, rows_id, query, args)
            });
            return Ok(self.wrap_rows(rows_id, rows));
        }

        let values = to_values(args)?;
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        trace!(stmt_id = %self.id, "query_context fallback to query");
        self.query(&values)
    }
}

impl NamedValueChecker for ProxyStmt {
    fn check_named_value(&mut self, value: &mut NamedValue) -> DriverResult<()> {
        match self.stmt.as_named_value_checker() {
            Some(backend) => backend.check_named_value(value),
            None => Err(DriverError::Skip),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::driver::Connector;
    use crate::memdb::{Capabilities, MemDriver};
    use crate::observer::NoopObserver;
    use crate::sequence::IdSequence;

    fn proxy_stmt(caps: Capabilities, query: &str) -> ProxyStmt {
        let backend = MemDriver::new(caps).connector("stmt-tests");
        let mut conn = backend.connect(&Context::background()).unwrap();
        conn.prepare("CREATE|people|name=text,age=int")
            .unwrap()
            .exec(&[])
            .unwrap();
        let stmt = conn.prepare(query).unwrap();
        let inst = Instrumentation {
            observer: Arc::new(NoopObserver),
            ids: Arc::new(IdSequence::new()),
        };
        ProxyStmt::new(CorrelationId::from(7), query.to_string(), stmt, inst)
    }

    #[test]
    fn test_query_text_and_num_input_forwarded() {
        let stmt = proxy_stmt(Capabilities::full(), "INSERT|people|name=?,age=?");
        assert_eq!(stmt.query_text(), "INSERT|people|name=?,age=?");
        assert_eq!(stmt.num_input(), Some(2));
        assert_eq!(stmt.id(), CorrelationId::from(7));
    }

    #[test]
    fn test_exec_context_fallback_rejects_named_args() {
        let mut stmt = proxy_stmt(Capabilities::baseline(), "INSERT|people|name=?,age=?");
        let args = [NamedValue::named("name", 1, "ada"), NamedValue::positional(2, 36)];
        assert_eq!(
            stmt.exec_context(&Context::background(), &args),
            Err(DriverError::NamedParametersUnsupported)
        );
    }

    #[test]
    fn test_query_context_fallback_honours_cancellation() {
        let mut stmt = proxy_stmt(Capabilities::baseline(), "SELECT|people|name");
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        assert!(matches!(stmt.query_context(&ctx, &[]), Err(DriverError::Canceled)));
    }

    #[test]
    fn test_named_value_checker_mirrors_backend() {
        let mut full = proxy_stmt(Capabilities::full(), "SELECT|people|name");
        assert!(full.as_named_value_checker().is_some());

        let mut bare = proxy_stmt(Capabilities::baseline(), "SELECT|people|name");
        assert!(bare.as_named_value_checker().is_none());
        assert_eq!(
            bare.check_named_value(&mut NamedValue::positional(1, 1)),
            Err(DriverError::Skip)
        );
    }
}
