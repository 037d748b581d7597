//! Tables and the pipe-separated command language.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::driver::{DriverError, DriverResult, ExecResult, Value, ValueKind};

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Bool,
    Text,
    Float,
    Bytes,
}

impl ColumnType {
    fn parse(name: &str) -> DriverResult<Self> {
        match name.trim() {
            "int" | "int64" => Ok(Self::Int),
            "bool" => Ok(Self::Bool),
            "text" | "string" => Ok(Self::Text),
            "float" | "float64" => Ok(Self::Float),
            "bytes" | "blob" => Ok(Self::Bytes),
            other => Err(DriverError::backend(format!("memdb: unknown column type {other:?}"))),
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Self::Int => ValueKind::Int,
            Self::Bool => ValueKind::Bool,
            Self::Text => ValueKind::Text,
            Self::Float => ValueKind::Float,
            Self::Bytes => ValueKind::Bytes,
        }
    }

    pub fn database_type_name(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Bool => "BOOL",
            Self::Text => "TEXT",
            Self::Float => "FLOAT",
            Self::Bytes => "BYTES",
        }
    }

    /// Variable-length types report an unbounded length.
    pub fn length(self) -> Option<i64> {
        match self {
            Self::Text | Self::Bytes => Some(i64::MAX),
            _ => None,
        }
    }

    fn coerce(self, column: &str, value: Value) -> DriverResult<Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Int, v @ Value::Int(_)) => Ok(v),
            (Self::Bool, v @ Value::Bool(_)) => Ok(v),
            (Self::Text, v @ Value::Text(_)) => Ok(v),
            (Self::Float, v @ Value::Float(_)) => Ok(v),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Bytes, v @ Value::Bytes(_)) => Ok(v),
            (Self::Bytes, Value::Text(s)) => Ok(Value::Bytes(s.into_bytes())),
            (ty, v) => Err(DriverError::backend(format!(
                "memdb: column {column} expects {}, got {:?}",
                ty.database_type_name(),
                v.kind()
            ))),
        }
    }

    fn parse_literal(self, column: &str, raw: &str) -> DriverResult<Value> {
        if raw.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        let invalid = || DriverError::backend(format!("memdb: invalid literal {raw:?} for column {column}"));
        match self {
            Self::Int => raw.parse().map(Value::Int).map_err(|_| invalid()),
            Self::Bool => raw.parse().map(Value::Bool).map_err(|_| invalid()),
            Self::Float => raw.parse().map(Value::Float).map_err(|_| invalid()),
            Self::Text => Ok(Value::Text(raw.to_string())),
            Self::Bytes => Ok(Value::Bytes(raw.as_bytes().to_vec())),
        }
    }
}

/// Right-hand side of an assignment or filter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Placeholder(usize),
    Literal(String),
}

impl Operand {
    fn resolve(&self, column: &str, ty: ColumnType, args: &[Value]) -> DriverResult<Value> {
        match self {
            Operand::Placeholder(i) => ty.coerce(column, args[*i].clone()),
            Operand::Literal(raw) => ty.parse_literal(column, raw),
        }
    }
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Create {
        table: String,
        columns: Vec<(String, ColumnType)>,
    },
    Insert {
        table: String,
        values: Vec<(String, Operand)>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        filter: Option<(String, Operand)>,
    },
    Wipe {
        table: String,
    },
}

impl Command {
    /// Parse one command. `FAIL|message` parses to a backend error carrying `message`.
    pub(crate) fn parse(query: &str) -> DriverResult<Self> {
        let parts: Vec<&str> = query.split('|').collect();
        let mut placeholders = 0;
        let mut operand = |raw: &str| {
            if raw == "?" {
                placeholders += 1;
                Operand::Placeholder(placeholders - 1)
            } else {
                Operand::Literal(raw.to_string())
            }
        };

        match parts.as_slice() {
            ["CREATE", table, columns] => {
                let columns = split_pairs(columns)?
                    .into_iter()
                    .map(|(name, ty)| Ok((name.to_string(), ColumnType::parse(ty)?)))
                    .collect::<DriverResult<Vec<_>>>()?;
                Ok(Command::Create {
                    table: table.to_string(),
                    columns,
                })
            }
            ["INSERT", table, values] => {
                let values = split_pairs(values)?
                    .into_iter()
                    .map(|(name, raw)| (name.to_string(), operand(raw)))
                    .collect();
                Ok(Command::Insert {
                    table: table.to_string(),
                    values,
                })
            }
            ["SELECT", table, columns, rest @ ..] if rest.len() <= 1 => {
                let filter = match rest.first() {
                    Some(clause) => {
                        let (name, raw) = split_pair(clause)?;
                        Some((name.to_string(), operand(raw)))
                    }
                    None => None,
                };
                Ok(Command::Select {
                    table: table.to_string(),
                    columns: columns.split(',').map(|c| c.trim().to_string()).collect(),
                    filter,
                })
            }
            ["WIPE", table] => Ok(Command::Wipe {
                table: table.to_string(),
            }),
            ["FAIL", message @ ..] => Err(DriverError::backend(message.join("|"))),
            _ => Err(DriverError::backend(format!("memdb: unsupported command {query:?}"))),
        }
    }

    /// Number of `?` placeholders.
    pub(crate) fn num_input(&self) -> usize {
        let count = |op: &Operand| matches!(op, Operand::Placeholder(_)) as usize;
        match self {
            Command::Insert { values, .. } => values.iter().map(|(_, op)| count(op)).sum(),
            Command::Select { filter, .. } => filter.as_ref().map_or(0, |(_, op)| count(op)),
            Command::Create { .. } | Command::Wipe { .. } => 0,
        }
    }
}

fn split_pair(raw: &str) -> DriverResult<(&str, &str)> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| DriverError::backend(format!("memdb: expected name=value, got {raw:?}")))
}

fn split_pairs(raw: &str) -> DriverResult<Vec<(&str, &str)>> {
    raw.split(',').map(split_pair).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    id: u64,
    values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct Table {
    columns: Vec<(String, ColumnType)>,
    rows: Vec<Row>,
}

impl Table {
    fn column(&self, table: &str, name: &str) -> DriverResult<(usize, ColumnType)> {
        self.columns
            .iter()
            .position(|(c, _)| c == name)
            .map(|i| (i, self.columns[i].1))
            .ok_or_else(|| DriverError::backend(format!("memdb: unknown column {table}.{name}")))
    }
}

/// Reverses one applied write. Rows are addressed by id, so undoing one
/// transaction leaves rows written by other connections in place.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Undo {
    DropTable(String),
    DeleteRow { table: String, row: u64 },
    RestoreRows { table: String, rows: Vec<Row> },
}

/// Materialized output of a SELECT.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResultSet {
    pub columns: Vec<(String, ColumnType)>,
    pub rows: Vec<Vec<Value>>,
}

/// All tables of one named database, shared by its connections.
#[derive(Debug, Default)]
pub(crate) struct Store {
    tables: DashMap<String, Table>,
    next_row: AtomicU64,
}

impl Store {
    /// Apply `undo`. Entries must be applied newest first.
    pub(crate) fn undo(&self, undo: Undo) {
        match undo {
            Undo::DropTable(table) => {
                self.tables.remove(&table);
            }
            Undo::DeleteRow { table, row } => {
                if let Some(mut entry) = self.tables.get_mut(&table) {
                    entry.rows.retain(|r| r.id != row);
                }
            }
            Undo::RestoreRows { table, rows } => {
                if let Some(mut entry) = self.tables.get_mut(&table) {
                    entry.rows.extend(rows);
                    entry.rows.sort_by_key(|r| r.id);
                }
            }
        }
    }

    /// Run a write, returning its result and the entry that reverses it.
    pub(crate) fn exec(&self, cmd: &Command, args: &[Value]) -> DriverResult<(ExecResult, Undo)> {
        check_arity(cmd, args)?;
        match cmd {
            Command::Create { table, columns } => {
                if self.tables.contains_key(table) {
                    return Err(DriverError::backend(format!("memdb: table {table} already exists")));
                }
                self.tables.insert(
                    table.clone(),
                    Table {
                        columns: columns.clone(),
                        rows: Vec::new(),
                    },
                );
                Ok((ExecResult::default(), Undo::DropTable(table.clone())))
            }
            Command::Insert { table, values } => {
                let mut entry = self.table_mut(table)?;
                let mut row = vec![Value::Null; entry.columns.len()];
                for (name, op) in values {
                    let (index, ty) = entry.column(table, name)?;
                    row[index] = op.resolve(name, ty, args)?;
                }
                let id = self.next_row.fetch_add(1, Ordering::Relaxed) + 1;
                entry.rows.push(Row { id, values: row });
                let result = ExecResult {
                    last_insert_id: Some(entry.rows.len() as i64),
                    rows_affected: 1,
                };
                Ok((result, Undo::DeleteRow { table: table.clone(), row: id }))
            }
            Command::Wipe { table } => {
                let mut entry = self.table_mut(table)?;
                let removed = std::mem::take(&mut entry.rows);
                let result = ExecResult {
                    last_insert_id: None,
                    rows_affected: removed.len() as u64,
                };
                Ok((result, Undo::RestoreRows { table: table.clone(), rows: removed }))
            }
            Command::Select { .. } => Err(DriverError::backend("memdb: SELECT returns rows, use query")),
        }
    }

    pub(crate) fn query(&self, cmd: &Command, args: &[Value]) -> DriverResult<ResultSet> {
        check_arity(cmd, args)?;
        let Command::Select {
            table,
            columns,
            filter,
        } = cmd
        else {
            return Err(DriverError::backend("memdb: only SELECT can be queried"));
        };

        let entry = self
            .tables
            .get(table)
            .ok_or_else(|| DriverError::backend(format!("memdb: no such table {table}")))?;
        let selected = columns
            .iter()
            .map(|name| entry.column(table, name))
            .collect::<DriverResult<Vec<_>>>()?;
        let filter = match filter {
            Some((name, op)) => {
                let (index, ty) = entry.column(table, name)?;
                Some((index, op.resolve(name, ty, args)?))
            }
            None => None,
        };

        let rows = entry
            .rows
            .iter()
            .map(|row| &row.values)
            .filter(|row| filter.as_ref().map_or(true, |(i, want)| &row[*i] == want))
            .map(|row| selected.iter().map(|(i, _)| row[*i].clone()).collect())
            .collect();
        Ok(ResultSet {
            columns: columns
                .iter()
                .zip(&selected)
                .map(|(name, (_, ty))| (name.clone(), *ty))
                .collect(),
            rows,
        })
    }

    fn table_mut(&self, table: &str) -> DriverResult<dashmap::mapref::one::RefMut<'_, String, Table>> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| DriverError::backend(format!("memdb: no such table {table}")))
    }
}

fn check_arity(cmd: &Command, args: &[Value]) -> DriverResult<()> {
    let expected = cmd.num_input();
    if args.len() != expected {
        return Err(DriverError::backend(format!(
            "memdb: expected {expected} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}
