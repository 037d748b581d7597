//! Backend capability surface.
//!
//! # Data Flow
//! ```text
//! Connector::connect
//!     → Conn (prepare / begin / close)
//!         → Stmt (exec / query / close)
//!             → Rows (next / close)
//!         → Tx (commit / rollback)
//! ```
//!
//! # Capabilities
//! Every baseline trait carries `as_*` probe methods for the optional
//! capabilities a backend may support. A probe returns `None` unless the
//! concrete instance implements the capability, so callers discover support
//! at runtime instead of assuming it.

pub mod error;
pub mod value;

use std::sync::Arc;

use crate::context::Context;

pub use error::{DriverError, DriverResult};
pub use value::{
    to_named, to_values, ExecResult, IsolationLevel, NamedValue, TxOptions, Value, ValueKind,
};

/// A database driver. Opening by name without a context is the legacy entry point.
pub trait Driver: Send + Sync {
    fn open(&self, name: &str) -> DriverResult<Box<dyn Conn>>;

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        None
    }
}

/// Driver able to hand out a reusable [`Connector`] for a data source name.
pub trait DriverContext: Send + Sync {
    fn open_connector(&self, name: &str) -> DriverResult<Arc<dyn Connector>>;
}

/// Context-aware connection factory.
pub trait Connector: Send + Sync {
    fn connect(&self, ctx: &Context) -> DriverResult<Box<dyn Conn>>;

    fn driver(&self) -> Arc<dyn Driver>;
}

/// A single backend connection.
pub trait Conn: Send {
    fn prepare(&mut self, query: &str) -> DriverResult<Box<dyn Stmt>>;

    fn begin(&mut self) -> DriverResult<Box<dyn Tx>>;

    fn close(self: Box<Self>) -> DriverResult<()>;

    fn as_prepare_context(&mut self) -> Option<&mut dyn ConnPrepareContext> {
        None
    }

    fn as_begin_tx(&mut self) -> Option<&mut dyn ConnBeginTx> {
        None
    }

    fn as_execer(&mut self) -> Option<&mut dyn Execer> {
        None
    }

    fn as_execer_context(&mut self) -> Option<&mut dyn ExecerContext> {
        None
    }

    fn as_queryer(&mut self) -> Option<&mut dyn Queryer> {
        None
    }

    fn as_queryer_context(&mut self) -> Option<&mut dyn QueryerContext> {
        None
    }

    fn as_session_resetter(&mut self) -> Option<&mut dyn SessionResetter> {
        None
    }

    fn as_named_value_checker(&mut self) -> Option<&mut dyn NamedValueChecker> {
        None
    }

    fn as_pinger(&mut self) -> Option<&mut dyn Pinger> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }
}

pub trait ConnPrepareContext {
    fn prepare_context(&mut self, ctx: &Context, query: &str) -> DriverResult<Box<dyn Stmt>>;
}

pub trait ConnBeginTx {
    fn begin_tx(&mut self, ctx: &Context, opts: TxOptions) -> DriverResult<Box<dyn Tx>>;
}

/// Direct exec on a connection, without preparing.
pub trait Execer {
    fn exec(&mut self, query: &str, args: &[Value]) -> DriverResult<ExecResult>;
}

pub trait ExecerContext {
    fn exec_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<ExecResult>;
}

/// Direct query on a connection, without preparing.
pub trait Queryer {
    fn query(&mut self, query: &str, args: &[Value]) -> DriverResult<Box<dyn Rows>>;
}

pub trait QueryerContext {
    fn query_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Box<dyn Rows>>;
}

/// Resets session state before a pooled connection is reused.
pub trait SessionResetter {
    fn reset_session(&mut self, ctx: &Context) -> DriverResult<()>;
}

/// Validates and possibly converts an argument before use.
pub trait NamedValueChecker {
    fn check_named_value(&mut self, value: &mut NamedValue) -> DriverResult<()>;
}

pub trait Pinger {
    fn ping(&mut self, ctx: &Context) -> DriverResult<()>;
}

pub trait Validator {
    fn is_valid(&self) -> bool;
}

/// A prepared statement.
pub trait Stmt: Send {
    fn close(self: Box<Self>) -> DriverResult<()>;

    /// Number of placeholders, `None` if the backend cannot tell.
    fn num_input(&self) -> Option<usize>;

    fn exec(&mut self, args: &[Value]) -> DriverResult<ExecResult>;

    fn query(&mut self, args: &[Value]) -> DriverResult<Box<dyn Rows>>;

    fn as_exec_context(&mut self) -> Option<&mut dyn StmtExecContext> {
        None
    }

    fn as_query_context(&mut self) -> Option<&mut dyn StmtQueryContext> {
        None
    }

    fn as_named_value_checker(&mut self) -> Option<&mut dyn NamedValueChecker> {
        None
    }
}

pub trait StmtExecContext {
    fn exec_context(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<ExecResult>;
}

pub trait StmtQueryContext {
    fn query_context(&mut self, ctx: &Context, args: &[NamedValue]) -> DriverResult<Box<dyn Rows>>;
}

/// A result cursor.
pub trait Rows: Send {
    fn columns(&self) -> Vec<String>;

    fn close(self: Box<Self>) -> DriverResult<()>;

    /// Fill `dest` with the next row. Returns `false` once the cursor is exhausted.
    fn next(&mut self, dest: &mut [Value]) -> DriverResult<bool>;

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        None
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        None
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        None
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        None
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        None
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn ColumnTypeScanType> {
        None
    }
}

pub trait RowsNextResultSet {
    fn has_next_result_set(&mut self) -> bool;

    /// Advance to the next result set. Returns `false` when there is none.
    fn next_result_set(&mut self) -> DriverResult<bool>;
}

pub trait ColumnTypeDatabaseTypeName {
    fn column_type_database_type_name(&self, index: usize) -> String;
}

pub trait ColumnTypeLength {
    fn column_type_length(&self, index: usize) -> Option<i64>;
}

pub trait ColumnTypeNullable {
    fn column_type_nullable(&self, index: usize) -> Option<bool>;
}

pub trait ColumnTypePrecisionScale {
    fn column_type_precision_scale(&self, index: usize) -> Option<(i64, i64)>;
}

pub trait ColumnTypeScanType {
    fn column_type_scan_type(&self, index: usize) -> Option<ValueKind>;
}

/// A transaction handle. Both terminal operations consume it.
pub trait Tx: Send {
    fn commit(self: Box<Self>) -> DriverResult<()>;

    fn rollback(self: Box<Self>) -> DriverResult<()>;
}
