//! Generic-path client.
//!
//! # Responsibilities
//! - Drive any [`Connector`], proxied or not, through its optional capabilities
//! - Treat an absent capability and [`DriverError::Skip`] the same way: fall
//!   back to the next, more generic path
//! - Own every handle it opens so callers close through one surface
//!
//! # Data Flow
//! ```text
//! Session::exec / query
//!     → ExecerContext / QueryerContext
//!     → (skip) ctx check → Execer / Queryer
//!     → (skip) prepare → Stmt exec / query → close
//! ```
//!
//! A one-shot statement behind a query stays open until its [`RowSet`] is
//! closed; the cursor closes first.

use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::driver::{
    to_named, to_values, Conn, Connector, DriverError, DriverResult, ExecResult, IsolationLevel,
    NamedValue, Rows, Stmt, Tx, TxOptions, Value,
};

fn check_ctx(ctx: &Context) -> DriverResult<()> {
    match ctx.err() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Entry point over a connector.
#[derive(Clone)]
pub struct Database {
    connector: Arc<dyn Connector>,
}

impl Database {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Open a new session.
    pub fn connect(&self, ctx: &Context) -> DriverResult<Session> {
        Ok(Session {
            conn: self.connector.connect(ctx)?,
        })
    }
}

/// One open connection.
pub struct Session {
    conn: Box<dyn Conn>,
}

impl Session {
    pub fn exec(&mut self, ctx: &Context, query: &str, args: &[Value]) -> DriverResult<ExecResult> {
        self.exec_named(ctx, query, &to_named(args))
    }

    /// Exec with named or positional arguments.
    pub fn exec_named(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult> {
        if let Some(execer) = self.conn.as_execer_context() {
            match execer.exec_context(ctx, query, args) {
                Err(DriverError::Skip) => {}
                other => return other,
            }
        }

        check_ctx(ctx)?;
        if let Some(execer) = self.conn.as_execer() {
            let values = to_values(args)?;
            match execer.exec(query, &values) {
                Err(DriverError::Skip) => {}
                other => return other,
            }
        }

        let mut stmt = self.prepare(ctx, query)?;
        let result = stmt.exec_named(ctx, args);
        stmt.close_quietly();
        result
    }

    pub fn query(&mut self, ctx: &Context, query: &str, args: &[Value]) -> DriverResult<RowSet> {
        self.query_named(ctx, query, &to_named(args))
    }

    /// Query with named or positional arguments.
    pub fn query_named(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<RowSet> {
        if let Some(queryer) = self.conn.as_queryer_context() {
            match queryer.query_context(ctx, query, args) {
                Err(DriverError::Skip) => {}
                other => return other.map(RowSet::new),
            }
        }

        check_ctx(ctx)?;
        if let Some(queryer) = self.conn.as_queryer() {
            let values = to_values(args)?;
            match queryer.query(query, &values) {
                Err(DriverError::Skip) => {}
                other => return other.map(RowSet::new),
            }
        }

        let mut stmt = self.prepare(ctx, query)?;
        match stmt.query_named(ctx, args) {
            Ok(rows) => Ok(rows.owning(stmt)),
            Err(err) => {
                stmt.close_quietly();
                Err(err)
            }
        }
    }

    pub fn prepare(&mut self, ctx: &Context, query: &str) -> DriverResult<Statement> {
        let stmt = match self.conn.as_prepare_context() {
            Some(preparer) => preparer.prepare_context(ctx, query)?,
            None => {
                check_ctx(ctx)?;
                self.conn.prepare(query)?
            }
        };
        Ok(Statement { stmt })
    }

    pub fn begin(&mut self, ctx: &Context, opts: TxOptions) -> DriverResult<Transaction> {
        let tx = match self.conn.as_begin_tx() {
            Some(beginner) => beginner.begin_tx(ctx, opts)?,
            None => {
                check_ctx(ctx)?;
                if opts.isolation != IsolationLevel::Default {
                    return Err(DriverError::UnsupportedIsolationLevel);
                }
                if opts.read_only {
                    return Err(DriverError::UnsupportedReadOnly);
                }
                self.conn.begin()?
            }
        };
        Ok(Transaction { tx })
    }

    /// Ping the backend. Backends that cannot ping are assumed alive.
    pub fn ping(&mut self, ctx: &Context) -> DriverResult<()> {
        match self.conn.as_pinger() {
            Some(pinger) => match pinger.ping(ctx) {
                Err(DriverError::Skip) => Ok(()),
                other => other,
            },
            None => check_ctx(ctx),
        }
    }

    /// Reset session state before reuse.
    pub fn reset(&mut self, ctx: &Context) -> DriverResult<()> {
        match self.conn.as_session_resetter() {
            Some(resetter) => resetter.reset_session(ctx),
            None => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.conn.as_validator().map_or(true, |v| v.is_valid())
    }

    pub fn close(self) -> DriverResult<()> {
        self.conn.close()
    }
}

/// A prepared statement.
pub struct Statement {
    stmt: Box<dyn Stmt>,
}

impl Statement {
    pub fn num_input(&self) -> Option<usize> {
        self.stmt.num_input()
    }

    pub fn exec(&mut self, ctx: &Context, args: &[Value]) -> DriverResult<ExecResult> {
        self.exec_named(ctx, &to_named(args))
    }

    pub fn exec_named(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult> {
        if let Some(stmt) = self.stmt.as_exec_context() {
            return stmt.exec_context(ctx, args);
        }
        let values = to_values(args)?;
        check_ctx(ctx)?;
        self.stmt.exec(&values)
    }

    pub fn query(&mut self, ctx: &Context, args: &[Value]) -> DriverResult<RowSet> {
        self.query_named(ctx, &to_named(args))
    }

    pub fn query_named(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<RowSet> {
        if let Some(stmt) = self.stmt.as_query_context() {
            return stmt.query_context(ctx, args).map(RowSet::new);
        }
        let values = to_values(args)?;
        check_ctx(ctx)?;
        self.stmt.query(&values).map(RowSet::new)
    }

    pub fn close(self) -> DriverResult<()> {
        self.stmt.close()
    }

    fn close_quietly(self) {
        if let Err(err) = self.stmt.close() {
            debug!(error = %err, "closing one-shot statement failed");
        }
    }
}

/// An open result cursor.
pub struct RowSet {
    rows: Box<dyn Rows>,
    columns: Vec<String>,
    stmt: Option<Statement>,
}

impl RowSet {
    fn new(rows: Box<dyn Rows>) -> Self {
        let columns = rows.columns();
        Self {
            rows,
            columns,
            stmt: None,
        }
    }

    fn owning(mut self, stmt: Statement) -> Self {
        self.stmt = Some(stmt);
        self
    }

    /// Column names of the current result set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The next row, `None` once the current result set is exhausted.
    pub fn next_row(&mut self) -> DriverResult<Option<Vec<Value>>> {
        let mut row = vec![Value::Null; self.columns.len()];
        if self.rows.next(&mut row)? {
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    /// Drain the remaining rows of the current result set.
    pub fn collect_rows(&mut self) -> DriverResult<Vec<Vec<Value>>> {
        let mut out = Vec::new();
        while let Some(row) = self.next_row()? {
            out.push(row);
        }
        Ok(out)
    }

    /// Advance to the next result set. `false` when there is none or the
    /// backend only ever returns one.
    pub fn next_result_set(&mut self) -> DriverResult<bool> {
        let advanced = match self.rows.as_next_result_set() {
            Some(sets) => sets.has_next_result_set() && sets.next_result_set()?,
            None => false,
        };
        if advanced {
            self.columns = self.rows.columns();
        }
        Ok(advanced)
    }

    /// The underlying cursor, for column-type introspection.
    pub fn rows(&self) -> &dyn Rows {
        self.rows.as_ref()
    }

    /// Close the cursor, then the one-shot statement behind it if any. The
    /// statement is closed even when the cursor fails to; the first error wins.
    pub fn close(self) -> DriverResult<()> {
        let rows = self.rows.close();
        let stmt = self.stmt.map_or(Ok(()), Statement::close);
        rows.and(stmt)
    }
}

/// An open transaction. Commit and rollback consume it.
pub struct Transaction {
    tx: Box<dyn Tx>,
}

impl Transaction {
    pub fn commit(self) -> DriverResult<()> {
        self.tx.commit()
    }

    pub fn rollback(self) -> DriverResult<()> {
        self.tx.rollback()
    }
}
