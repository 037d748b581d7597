//! Result cursor wrapper. Only creation and close are reported; row reads pass straight through.

use std::time::Instant;

use crate::context::Context;
use crate::driver::{
    ColumnTypeDatabaseTypeName, ColumnTypeLength, ColumnTypeNullable, ColumnTypePrecisionScale,
    ColumnTypeScanType, DriverResult, Rows, RowsNextResultSet, Value, ValueKind,
};
use crate::observer::Hook;
use crate::proxy::{timed, Instrumentation};
use crate::sequence::CorrelationId;

pub struct ProxyRows {
    id: CorrelationId,
    rows: Box<dyn Rows>,
    inst: Instrumentation,
}

impl ProxyRows {
    pub(crate) fn new(id: CorrelationId, rows: Box<dyn Rows>, inst: Instrumentation) -> Self {
        Self { id, rows, inst }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }
}

impl Rows for ProxyRows {
    fn columns(&self) -> Vec<String> {
        self.rows.columns()
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        let ProxyRows { id, rows, inst } = *self;
        let started = Instant::now();
        rows.close()?;

        inst.notify(Hook::RowsClose, |o| o.rows_close(&timed(&Context::background(), started), id));
        Ok(())
    }

    fn next(&mut self, dest: &mut [Value]) -> DriverResult<bool> {
        self.rows.next(dest)
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if self.rows.as_next_result_set().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        self.rows
            .as_column_type_database_type_name()
            .map(|_| self as &dyn ColumnTypeDatabaseTypeName)
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        self.rows.as_column_type_length().map(|_| self as &dyn ColumnTypeLength)
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        self.rows.as_column_type_nullable().map(|_| self as &dyn ColumnTypeNullable)
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        self.rows
            .as_column_type_precision_scale()
            .map(|_| self as &dyn ColumnTypePrecisionScale)
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn ColumnTypeScanType> {
        self.rows.as_column_type_scan_type().map(|_| self as &dyn ColumnTypeScanType)
    }
}

impl RowsNextResultSet for ProxyRows {
    fn has_next_result_set(&mut self) -> bool {
        self.rows
            .as_next_result_set()
            .is_some_and(|backend| backend.has_next_result_set())
    }

    fn next_result_set(&mut self) -> DriverResult<bool> {
        match self.rows.as_next_result_set() {
            Some(backend) => backend.next_result_set(),
            None => Ok(false),
        }
    }
}

impl ColumnTypeDatabaseTypeName for ProxyRows {
    fn column_type_database_type_name(&self, index: usize) -> String {
        self.rows
            .as_column_type_database_type_name()
            .map(|ct| ct.column_type_database_type_name(index))
            .unwrap_or_default()
    }
}

impl ColumnTypeLength for ProxyRows {
    fn column_type_length(&self, index: usize) -> Option<i64> {
        self.rows.as_column_type_length()?.column_type_length(index)
    }
}

impl ColumnTypeNullable for ProxyRows {
    fn column_type_nullable(&self, index: usize) -> Option<bool> {
        self.rows.as_column_type_nullable()?.column_type_nullable(index)
    }
}

impl ColumnTypePrecisionScale for ProxyRows {
    fn column_type_precision_scale(&self, index: usize) -> Option<(i64, i64)> {
        self.rows
            .as_column_type_precision_scale()?
            .column_type_precision_scale(index)
    }
}

impl ColumnTypeScanType for ProxyRows {
    fn column_type_scan_type(&self, index: usize) -> Option<ValueKind> {
        self.rows.as_column_type_scan_type()?.column_type_scan_type(index)
    }
}
