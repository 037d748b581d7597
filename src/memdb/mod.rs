//! In-memory reference backend.
//!
//! # Responsibilities
//! - Implement every optional driver capability, each switchable per driver
//! - Execute a small pipe-separated command language against shared tables
//! - Count opened and closed resources so leaks are observable in tests
//! - Inject failures on connect, close and commit
//!
//! # Commands
//! ```text
//! CREATE|table|col=type,...        types: int, bool, text|string, float, bytes
//! INSERT|table|col=?,col=literal   ? binds the next positional argument
//! SELECT|table|col,col[|col=?]     optional equality filter
//! WIPE|table
//! FAIL|message                     fails with a backend error
//! ```
//!
//! Connections opened under the same database name share their tables.

mod conn;
mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tracing::debug;

use crate::context::Context;
use crate::driver::{Conn, Connector, Driver, DriverContext, DriverError, DriverResult};

pub use conn::{MemConn, MemRows, MemStmt, MemTx};
pub use store::ColumnType;

use store::Store;

/// Which optional capabilities the backend advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub driver_context: bool,
    pub prepare_context: bool,
    pub begin_tx: bool,
    pub execer: bool,
    pub execer_context: bool,
    pub queryer: bool,
    pub queryer_context: bool,
    pub session_resetter: bool,
    pub named_value_checker: bool,
    pub pinger: bool,
    pub validator: bool,
    pub stmt_exec_context: bool,
    pub stmt_query_context: bool,
    pub next_result_set: bool,
    pub column_types: bool,
}

impl Capabilities {
    /// Every optional capability.
    pub const fn full() -> Self {
        Self::uniform(true)
    }

    /// Only the baseline traits.
    pub const fn baseline() -> Self {
        Self::uniform(false)
    }

    const fn uniform(on: bool) -> Self {
        Self {
            driver_context: on,
            prepare_context: on,
            begin_tx: on,
            execer: on,
            execer_context: on,
            queryer: on,
            queryer_context: on,
            session_resetter: on,
            named_value_checker: on,
            pinger: on,
            validator: on,
            stmt_exec_context: on,
            stmt_query_context: on,
            next_result_set: on,
            column_types: on,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Injected failures. Each set message becomes a backend error on that operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    pub connect: Option<String>,
    pub close: Option<String>,
    pub commit: Option<String>,
}

#[derive(Debug, Default)]
struct Counters {
    conns_opened: AtomicU64,
    conns_closed: AtomicU64,
    stmts_prepared: AtomicU64,
    stmts_closed: AtomicU64,
    rows_opened: AtomicU64,
    rows_closed: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Point-in-time resource counters. Each field is loaded separately, so the
/// derived open counts saturate at zero when a close lands between loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemStats {
    pub conns_opened: u64,
    pub conns_closed: u64,
    pub stmts_prepared: u64,
    pub stmts_closed: u64,
    pub rows_opened: u64,
    pub rows_closed: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

impl MemStats {
    pub fn open_conns(&self) -> u64 {
        self.conns_opened.saturating_sub(self.conns_closed)
    }

    pub fn open_stmts(&self) -> u64 {
        self.stmts_prepared.saturating_sub(self.stmts_closed)
    }

    pub fn open_rows(&self) -> u64 {
        self.rows_opened.saturating_sub(self.rows_closed)
    }
}

pub(crate) struct Shared {
    caps: Capabilities,
    faults: ArcSwap<Faults>,
    counters: Counters,
}

/// The in-memory driver. Databases are created on first use of their name.
pub struct MemDriver {
    me: Weak<MemDriver>,
    shared: Arc<Shared>,
    databases: DashMap<String, Arc<Store>>,
}

impl MemDriver {
    pub fn new(caps: Capabilities) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            shared: Arc::new(Shared {
                caps,
                faults: ArcSwap::from_pointee(Faults::default()),
                counters: Counters::default(),
            }),
            databases: DashMap::new(),
        })
    }

    /// A connector for the database called `name`.
    pub fn connector(self: &Arc<Self>, name: &str) -> Arc<MemConnector> {
        Arc::new(MemConnector {
            driver: self.clone(),
            name: name.to_string(),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.shared.caps
    }

    /// Replace the injected failures for every connection of this driver.
    pub fn set_faults(&self, faults: Faults) {
        self.shared.faults.store(Arc::new(faults));
    }

    pub fn stats(&self) -> MemStats {
        let c = &self.shared.counters;
        MemStats {
            conns_opened: c.conns_opened.load(Ordering::Relaxed),
            conns_closed: c.conns_closed.load(Ordering::Relaxed),
            stmts_prepared: c.stmts_prepared.load(Ordering::Relaxed),
            stmts_closed: c.stmts_closed.load(Ordering::Relaxed),
            rows_opened: c.rows_opened.load(Ordering::Relaxed),
            rows_closed: c.rows_closed.load(Ordering::Relaxed),
            commits: c.commits.load(Ordering::Relaxed),
            rollbacks: c.rollbacks.load(Ordering::Relaxed),
        }
    }

    fn open_conn(&self, name: &str) -> DriverResult<MemConn> {
        if let Some(message) = self.shared.faults.load().connect.clone() {
            return Err(DriverError::backend(message));
        }
        let store = self.databases.entry(name.to_string()).or_default().value().clone();
        Ok(MemConn::new(store, self.shared.clone()))
    }
}

impl Driver for MemDriver {
    fn open(&self, name: &str) -> DriverResult<Box<dyn Conn>> {
        Ok(Box::new(self.open_conn(name)?))
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        if self.shared.caps.driver_context {
            Some(self)
        } else {
            None
        }
    }
}

impl DriverContext for MemDriver {
    fn open_connector(&self, name: &str) -> DriverResult<Arc<dyn Connector>> {
        let driver = self
            .me
            .upgrade()
            .ok_or_else(|| DriverError::backend("memdb: driver dropped"))?;
        Ok(driver.connector(name))
    }
}

/// Connector bound to one named database.
pub struct MemConnector {
    driver: Arc<MemDriver>,
    name: String,
}

impl MemConnector {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mem_driver(&self) -> &Arc<MemDriver> {
        &self.driver
    }

    pub fn stats(&self) -> MemStats {
        self.driver.stats()
    }
}

impl Connector for MemConnector {
    fn connect(&self, ctx: &Context) -> DriverResult<Box<dyn Conn>> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let conn = self.driver.open_conn(&self.name)?;
        debug!(database = %self.name, "memdb connection opened");
        Ok(Box::new(conn))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Value;

    #[test]
    fn test_connections_share_named_database() {
        let driver = MemDriver::new(Capabilities::full());
        let ctx = Context::background();

        let mut a = driver.connector("shared").connect(&ctx).unwrap();
        a.prepare("CREATE|t|n=int").unwrap().exec(&[]).unwrap();
        a.prepare("INSERT|t|n=?").unwrap().exec(&[Value::Int(5)]).unwrap();

        let mut b = driver.connector("shared").connect(&ctx).unwrap();
        let mut rows = b.prepare("SELECT|t|n").unwrap().query(&[]).unwrap();
        let mut dest = vec![Value::Null];
        assert!(rows.next(&mut dest).unwrap());
        assert_eq!(dest, vec![Value::Int(5)]);

        let mut other = driver.connector("other").connect(&ctx).unwrap();
        assert!(other.prepare("SELECT|t|n").unwrap().query(&[]).is_err());
    }

    #[test]
    fn test_rollback_restores_tables() {
        let driver = MemDriver::new(Capabilities::baseline());
        let mut conn = driver.connector("tx").connect(&Context::background()).unwrap();
        conn.prepare("CREATE|t|n=int").unwrap().exec(&[]).unwrap();

        let tx = conn.begin().unwrap();
        conn.prepare("INSERT|t|n=1").unwrap().exec(&[]).unwrap();
        tx.rollback().unwrap();

        let mut rows = conn.prepare("SELECT|t|n").unwrap().query(&[]).unwrap();
        assert!(!rows.next(&mut [Value::Null]).unwrap());
        assert_eq!(driver.stats().rollbacks, 1);
    }

    #[test]
    fn test_rollback_keeps_other_connections_writes() {
        let driver = MemDriver::new(Capabilities::full());
        let connector = driver.connector("isolation");
        let ctx = Context::background();
        let mut a = connector.connect(&ctx).unwrap();
        let mut b = connector.connect(&ctx).unwrap();
        a.as_execer().unwrap().exec("CREATE|t|n=int", &[]).unwrap();

        let tx = a.begin().unwrap();
        a.as_execer().unwrap().exec("INSERT|t|n=?", &[Value::Int(1)]).unwrap();
        b.as_execer().unwrap().exec("INSERT|t|n=?", &[Value::Int(2)]).unwrap();
        tx.rollback().unwrap();

        let mut rows = b.as_queryer().unwrap().query("SELECT|t|n", &[]).unwrap();
        let mut dest = vec![Value::Null];
        assert!(rows.next(&mut dest).unwrap());
        assert_eq!(dest, vec![Value::Int(2)]);
        assert!(!rows.next(&mut dest).unwrap());
    }

    #[test]
    fn test_failed_commit_undoes_and_nested_begin_is_rejected() {
        let driver = MemDriver::new(Capabilities::baseline());
        let mut conn = driver.connector("commit").connect(&Context::background()).unwrap();
        conn.prepare("CREATE|t|n=int").unwrap().exec(&[]).unwrap();

        let tx = conn.begin().unwrap();
        assert!(conn.begin().is_err());
        conn.prepare("INSERT|t|n=1").unwrap().exec(&[]).unwrap();
        driver.set_faults(Faults {
            commit: Some("commit refused".into()),
            ..Default::default()
        });
        assert_eq!(tx.commit(), Err(DriverError::backend("commit refused")));

        let mut rows = conn.prepare("SELECT|t|n").unwrap().query(&[]).unwrap();
        assert!(!rows.next(&mut [Value::Null]).unwrap());
        driver.set_faults(Faults::default());
        conn.begin().unwrap().commit().unwrap();
    }

    #[test]
    fn test_open_counts_saturate() {
        let stats = MemStats {
            rows_opened: 1,
            rows_closed: 2,
            ..Default::default()
        };
        assert_eq!(stats.open_rows(), 0);
    }

    #[test]
    fn test_faults_and_stats() {
        let driver = MemDriver::new(Capabilities::full());
        let connector = driver.connector("faults");
        let conn = connector.connect(&Context::background()).unwrap();

        driver.set_faults(Faults {
            close: Some("close refused".into()),
            ..Default::default()
        });
        assert_eq!(conn.close(), Err(DriverError::backend("close refused")));

        driver.set_faults(Faults {
            connect: Some("no route".into()),
            ..Default::default()
        });
        assert!(connector.connect(&Context::background()).is_err());
        assert_eq!(connector.stats().open_conns(), 1);
    }

    #[test]
    fn test_capability_switches() {
        let driver = MemDriver::new(Capabilities::baseline());
        let mut conn = driver.connector("caps").connect(&Context::background()).unwrap();
        assert!(conn.as_execer().is_none());
        assert!(conn.as_validator().is_none());
        assert!(driver.as_driver_context().is_none());

        let driver = MemDriver::new(Capabilities::default());
        assert!(driver.as_driver_context().is_some());
        assert_eq!(driver.capabilities(), Capabilities::full());
    }
}
