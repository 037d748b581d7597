//! Connector and driver wrappers, the entry points of a proxy tree.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::context::Context;
use crate::driver::{Conn, Connector, Driver, DriverContext, DriverError, DriverResult};
use crate::observer::Hook;
use crate::proxy::{timed, Instrumentation, ProxyConn};

/// Connector that wraps every connection it opens.
pub struct ProxyConnector {
    connector: Arc<dyn Connector>,
    inst: Instrumentation,
}

impl ProxyConnector {
    pub(crate) fn new(connector: Arc<dyn Connector>, inst: Instrumentation) -> Self {
        Self { connector, inst }
    }
}

impl Connector for ProxyConnector {
    fn connect(&self, ctx: &Context) -> DriverResult<Box<dyn Conn>> {
        let started = Instant::now();
        let conn = self.connector.connect(ctx)?;

        let conn_id = self.inst.next_id();
        self.inst.notify(Hook::Connect, |o| o.connect(&timed(ctx, started), conn_id));

        Ok(Box::new(ProxyConn::new(conn_id, conn, self.inst.clone())))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(ProxyDriver {
            driver: self.connector.driver(),
            inst: self.inst.clone(),
        })
    }
}

/// Driver view of a proxy tree.
///
/// Opening a connection by name is not supported; use a connector.
pub struct ProxyDriver {
    driver: Arc<dyn Driver>,
    inst: Instrumentation,
}

impl Driver for ProxyDriver {
    fn open(&self, _name: &str) -> DriverResult<Box<dyn Conn>> {
        panic!("ProxyDriver::open is not supported, connect through a ProxyConnector");
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        self.driver.as_driver_context().map(|_| self as &dyn DriverContext)
    }
}

impl DriverContext for ProxyDriver {
    fn open_connector(&self, name: &str) -> DriverResult<Arc<dyn Connector>> {
        let Some(driver_ctx) = self.driver.as_driver_context() else {
            return Err(DriverError::Skip);
        };
        let connector = driver_ctx.open_connector(name)?;
        debug!(name, "wrapped connector opened through driver");
        Ok(Arc::new(ProxyConnector::new(connector, self.inst.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memdb::{Capabilities, MemDriver};
    use crate::observer::NoopObserver;
    use crate::proxy::wrap;
    use crate::sequence::IdSequence;

    #[test]
    #[should_panic(expected = "not supported")]
    fn test_open_by_name_panics() {
        let backend = MemDriver::new(Capabilities::full()).connector("db");
        let proxy = wrap(Arc::new(NoopObserver), backend);
        let _ = proxy.driver().open("db");
    }

    #[test]
    fn test_driver_context_mirrors_backend() {
        let full = wrap(Arc::new(NoopObserver), MemDriver::new(Capabilities::full()).connector("db"));
        assert!(full.driver().as_driver_context().is_some());

        let bare = wrap(
            Arc::new(NoopObserver),
            MemDriver::new(Capabilities::baseline()).connector("db"),
        );
        assert!(bare.driver().as_driver_context().is_none());
    }

    #[test]
    fn test_open_connector_skips_without_backend_support() {
        let proxy_driver = ProxyDriver {
            driver: MemDriver::new(Capabilities::baseline()),
            inst: Instrumentation {
                observer: Arc::new(NoopObserver),
                ids: Arc::new(IdSequence::new()),
            },
        };
        assert!(matches!(proxy_driver.open_connector("db"), Err(DriverError::Skip)));
    }
}
