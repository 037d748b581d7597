//! Connections, statements, cursors and transactions of the in-memory backend.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::Context;
use crate::driver::{
    to_values, ColumnTypeDatabaseTypeName, ColumnTypeLength, ColumnTypeNullable,
    ColumnTypePrecisionScale, ColumnTypeScanType, Conn, ConnBeginTx, ConnPrepareContext,
    DriverError, DriverResult, ExecResult, Execer, ExecerContext, NamedValue, NamedValueChecker,
    Pinger, Queryer, QueryerContext, Rows, RowsNextResultSet, SessionResetter, Stmt,
    StmtExecContext, StmtQueryContext, Tx, TxOptions, Validator, Value, ValueKind,
};
use crate::memdb::store::{Command, ResultSet, Store, Undo};
use crate::memdb::Shared;

fn check_ctx(ctx: &Context) -> DriverResult<()> {
    match ctx.err() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Writes of the connection's open transaction, oldest first. `None` when no
/// transaction is open.
type UndoLog = Arc<Mutex<Option<Vec<Undo>>>>;

fn lock(log: &UndoLog) -> MutexGuard<'_, Option<Vec<Undo>>> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write(store: &Store, log: &UndoLog, cmd: &Command, args: &[Value]) -> DriverResult<ExecResult> {
    let (result, undo) = store.exec(cmd, args)?;
    if let Some(entries) = lock(log).as_mut() {
        entries.push(undo);
    }
    Ok(result)
}

pub struct MemConn {
    store: Arc<Store>,
    shared: Arc<Shared>,
    log: UndoLog,
}

impl MemConn {
    pub(crate) fn new(store: Arc<Store>, shared: Arc<Shared>) -> Self {
        shared.counters.conns_opened.fetch_add(1, Ordering::Relaxed);
        Self {
            store,
            shared,
            log: UndoLog::default(),
        }
    }

    fn statement(&self, query: &str) -> DriverResult<MemStmt> {
        let cmd = Command::parse(query)?;
        Ok(MemStmt::new(
            cmd,
            self.store.clone(),
            self.shared.clone(),
            self.log.clone(),
        ))
    }

    fn transaction(&self) -> DriverResult<MemTx> {
        let mut log = lock(&self.log);
        if log.is_some() {
            return Err(DriverError::backend("memdb: transaction already open"));
        }
        *log = Some(Vec::new());
        Ok(MemTx {
            store: self.store.clone(),
            shared: self.shared.clone(),
            log: self.log.clone(),
        })
    }

    fn exec_now(&self, query: &str, args: &[Value]) -> DriverResult<ExecResult> {
        write(&self.store, &self.log, &Command::parse(query)?, args)
    }

    fn query_now(&self, query: &str, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        let set = self.store.query(&Command::parse(query)?, args)?;
        Ok(Box::new(MemRows::new(set, self.shared.clone())))
    }
}

impl Conn for MemConn {
    fn prepare(&mut self, query: &str) -> DriverResult<Box<dyn Stmt>> {
        Ok(Box::new(self.statement(query)?))
    }

    fn begin(&mut self) -> DriverResult<Box<dyn Tx>> {
        Ok(Box::new(self.transaction()?))
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        if let Some(message) = &self.shared.faults.load().close {
            return Err(DriverError::backend(message.clone()));
        }
        self.shared.counters.conns_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn as_prepare_context(&mut self) -> Option<&mut dyn ConnPrepareContext> {
        if self.shared.caps.prepare_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_begin_tx(&mut self) -> Option<&mut dyn ConnBeginTx> {
        if self.shared.caps.begin_tx {
            Some(self)
        } else {
            None
        }
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        if self.shared.caps.execer {
            Some(self)
        } else {
            None
        }
    }

    fn as_execer_context(&mut self) -> Option<&mut dyn ExecerContext> {
        if self.shared.caps.execer_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        if self.shared.caps.queryer {
            Some(self)
        } else {
            None
        }
    }

    fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
        if self.shared.caps.queryer_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_session_resetter(&mut self) -> Option<&mut dyn SessionResetter> {
        if self.shared.caps.session_resetter {
            Some(self)
        } else {
            None
        }
    }

    fn as_named_value_checker(&mut self) -> Option<&mut dyn NamedValueChecker> {
        if self.shared.caps.named_value_checker {
            Some(self)
        } else {
            None
        }
    }

    fn as_pinger(&mut self) -> Option<&mut dyn Pinger> {
        if self.shared.caps.pinger {
            Some(self)
        } else {
            None
        }
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        if self.shared.caps.validator {
            Some(self)
        } else {
            None
        }
    }
}

impl ConnPrepareContext for MemConn {
    fn prepare_context(&mut self, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>> {
        check_ctx(ctx)?;
        Ok(Box::new(self.statement(query)?))
    }
}

impl ConnBeginTx for MemConn {
    fn begin_tx(&mut self, ctx: &Context, _opts: TxOptions) -> DriverResult<Box<dyn Tx>> {
        // single-copy store: any isolation level is satisfied
        check_ctx(ctx)?;
        Ok(Box::new(self.transaction()?))
    }
}

impl Execer for MemConn {
    fn exec(&mut self, query: &str, args: &[Value]) -> DriverResult<ExecResult> {
        self.exec_now(query, args)
    }
}

impl ExecerContext for MemConn {
    fn exec_context(&mut self, ctx: &Context, query: &str, args: &[NamedValue]) -> DriverResult<ExecResult> {
        check_ctx(ctx)?;
        self.exec_now(query, &to_values(args)?)
    }
}

impl Queryer for MemConn {
    fn query(&mut self, query: &str, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        self.query_now(query, args)
    }
}

impl QueryerContext for MemConn {
    fn query_context(&mut self, ctx: &Context, query: &str, args: &[NamedValue]) -> DriverResult<Box<dyn Rows>> {
        check_ctx(ctx)?;
        self.query_now(query, &to_values(args)?)
    }
}

impl SessionResetter for MemConn {
    fn reset_session(&mut self, ctx: &Context) -> DriverResult<()> {
        check_ctx(ctx)
    }
}

impl NamedValueChecker for MemConn {
    fn check_named_value(&mut self, value: &mut NamedValue) -> DriverResult<()> {
        check_storable(value)
    }
}

impl Pinger for MemConn {
    fn ping(&mut self, ctx: &Context) -> DriverResult<()> {
        check_ctx(ctx)
    }
}

impl Validator for MemConn {
    fn is_valid(&self) -> bool {
        true
    }
}

fn check_storable(value: &NamedValue) -> DriverResult<()> {
    match value.value {
        Value::Float(f) if f.is_nan() => Err(DriverError::backend(format!(
            "memdb: argument {} is NaN",
            value.ordinal
        ))),
        _ => Ok(()),
    }
}

pub struct MemStmt {
    cmd: Command,
    store: Arc<Store>,
    shared: Arc<Shared>,
    log: UndoLog,
}

impl MemStmt {
    fn new(cmd: Command, store: Arc<Store>, shared: Arc<Shared>, log: UndoLog) -> Self {
        shared.counters.stmts_prepared.fetch_add(1, Ordering::Relaxed);
        Self {
            cmd,
            store,
            shared,
            log,
        }
    }

    fn query_now(&self, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        let set = self.store.query(&self.cmd, args)?;
        Ok(Box::new(MemRows::new(set, self.shared.clone())))
    }
}

impl Stmt for MemStmt {
    fn close(self: Box<Self>) -> DriverResult<()> {
        self.shared.counters.stmts_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn num_input(&self) -> Option<usize> {
        Some(self.cmd.num_input())
    }

    fn exec(&mut self, args: &[Value]) -> DriverResult<ExecResult> {
        write(&self.store, &self.log, &self.cmd, args)
    }

    fn query(&mut self, args: &[Value]) -> DriverResult<Box<dyn Rows>> {
        self.query_now(args)
    }

    fn as_exec_context(&mut self) -> Option<&mut dyn StmtExecContext> {
        if self.shared.caps.stmt_exec_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_query_context(&mut self) -> Option<&mut dyn StmtQueryContext> {
        if self.shared.caps.stmt_query_context {
            Some(self)
        } else {
            None
        }
    }

    fn as_named_value_checker(&mut self) -> Option<&mut dyn NamedValueChecker> {
        if self.shared.caps.named_value_checker {
            Some(self)
        } else {
            None
        }
    }
}

impl StmtExecContext for MemStmt {
    fn exec_context(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult> {
        check_ctx(ctx)?;
        write(&self.store, &self.log, &self.cmd, &to_values(args)?)
    }
}

impl StmtQueryContext for MemStmt {
    fn query_context(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<Box<dyn Rows>> {
        check_ctx(ctx)?;
        self.query_now(&to_values(args)?)
    }
}

impl NamedValueChecker for MemStmt {
    fn check_named_value(&mut self, value: &mut NamedValue) -> DriverResult<()> {
        check_storable(value)
    }
}

/// A fully materialized result set.
pub struct MemRows {
    set: ResultSet,
    cursor: usize,
    shared: Arc<Shared>,
}

impl MemRows {
    fn new(set: ResultSet, shared: Arc<Shared>) -> Self {
        shared.counters.rows_opened.fetch_add(1, Ordering::Relaxed);
        Self {
            set,
            cursor: 0,
            shared,
        }
    }
}

impl Rows for MemRows {
    fn columns(&self) -> Vec<String> {
        self.set.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        self.shared.counters.rows_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn next(&mut self, dest: &mut [Value]) -> DriverResult<bool> {
        let Some(row) = self.set.rows.get(self.cursor) else {
            return Ok(false);
        };
        if dest.len() < row.len() {
            return Err(DriverError::backend(format!(
                "memdb: destination holds {} values, row has {}",
                dest.len(),
                row.len()
            )));
        }
        dest[..row.len()].clone_from_slice(row);
        self.cursor += 1;
        Ok(true)
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if self.shared.caps.next_result_set {
            Some(self)
        } else {
            None
        }
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        if self.shared.caps.column_types {
            Some(self)
        } else {
            None
        }
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        if self.shared.caps.column_types {
            Some(self)
        } else {
            None
        }
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        if self.shared.caps.column_types {
            Some(self)
        } else {
            None
        }
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        if self.shared.caps.column_types {
            Some(self)
        } else {
            None
        }
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn ColumnTypeScanType> {
        if self.shared.caps.column_types {
            Some(self)
        } else {
            None
        }
    }
}

impl RowsNextResultSet for MemRows {
    fn has_next_result_set(&mut self) -> bool {
        false
    }

    fn next_result_set(&mut self) -> DriverResult<bool> {
        Ok(false)
    }
}

impl ColumnTypeDatabaseTypeName for MemRows {
    fn column_type_database_type_name(&self, index: usize) -> String {
        self.set
            .columns
            .get(index)
            .map(|(_, ty)| ty.database_type_name().to_string())
            .unwrap_or_default()
    }
}

impl ColumnTypeLength for MemRows {
    fn column_type_length(&self, index: usize) -> Option<i64> {
        self.set.columns.get(index)?.1.length()
    }
}

impl ColumnTypeNullable for MemRows {
    fn column_type_nullable(&self, index: usize) -> Option<bool> {
        self.set.columns.get(index).map(|_| true)
    }
}

impl ColumnTypePrecisionScale for MemRows {
    fn column_type_precision_scale(&self, _index: usize) -> Option<(i64, i64)> {
        None
    }
}

impl ColumnTypeScanType for MemRows {
    fn column_type_scan_type(&self, index: usize) -> Option<ValueKind> {
        self.set.columns.get(index).map(|(_, ty)| ty.kind())
    }
}

/// Ends the connection's transaction. Rollback undoes only the writes made
/// through this connection since begin.
pub struct MemTx {
    store: Arc<Store>,
    shared: Arc<Shared>,
    log: UndoLog,
}

impl MemTx {
    fn finish(&self) -> Vec<Undo> {
        lock(&self.log).take().unwrap_or_default()
    }

    fn revert(&self, entries: Vec<Undo>) {
        for undo in entries.into_iter().rev() {
            self.store.undo(undo);
        }
    }
}

impl Tx for MemTx {
    fn commit(self: Box<Self>) -> DriverResult<()> {
        let entries = self.finish();
        if let Some(message) = self.shared.faults.load().commit.clone() {
            self.revert(entries);
            return Err(DriverError::backend(message));
        }
        self.shared.counters.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> DriverResult<()> {
        let entries = self.finish();
        self.revert(entries);
        self.shared.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
