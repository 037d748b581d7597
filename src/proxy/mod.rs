//! Capability-forwarding proxy.
//!
//! # Data Flow
//! ```text
//! wrap(observer, connector) → ProxyConnector
//!     → connect → ProxyConn (CONN id)
//!         → prepare → ProxyStmt (STMT id)
//!             → exec / query → ProxyRows (ROWS id)
//!         → begin → ProxyTx (TX id)
//!         → query → ProxyRows (ROWS id)
//! ```
//!
//! # Design Decisions
//! - Every wrapper answers the backend's capability probes with its own
//!   implementation when the backend supports the capability, so callers see
//!   the same capability set through the proxy as without it
//! - Context-aware prepare, begin and statement exec/query are always offered
//!   and fall back to the plain call
//! - A failed backend call returns the error unchanged, mints no ID and fires
//!   no notification
//! - Observers never see the caller's context; they get a derived one
//!   carrying the call's [`Timing`]

mod conn;
mod connector;
mod rows;
mod stmt;
mod tx;

use std::sync::Arc;
use std::time::Instant;

use crate::context::Context;
use crate::driver::{Connector, DriverError, DriverResult, Rows};
use crate::observer::{Hook, HookSet, Observer, TraceToken};
use crate::sequence::{CorrelationId, IdSequence};
use crate::timing::{with_timing, Timing};

pub use conn::ProxyConn;
pub use connector::{ProxyConnector, ProxyDriver};
pub use rows::ProxyRows;
pub use stmt::ProxyStmt;
pub use tx::ProxyTx;

/// Wrap `connector` so every operation through it is reported to `observer`.
///
/// IDs come from a fresh sequence owned by this proxy tree. No connection is
/// opened until [`Connector::connect`] is called.
pub fn wrap(observer: Arc<dyn Observer>, connector: Arc<dyn Connector>) -> ProxyConnector {
    wrap_with_sequence(observer, connector, Arc::new(IdSequence::new()))
}

/// Like [`wrap`], drawing IDs from a caller-supplied sequence.
pub fn wrap_with_sequence(
    observer: Arc<dyn Observer>,
    connector: Arc<dyn Connector>,
    ids: Arc<IdSequence>,
) -> ProxyConnector {
    ProxyConnector::new(connector, Instrumentation { observer, ids })
}

/// Observer and ID sequence shared by every wrapper of one proxy tree.
#[derive(Clone)]
pub(crate) struct Instrumentation {
    observer: Arc<dyn Observer>,
    ids: Arc<IdSequence>,
}

impl Instrumentation {
    pub(crate) fn next_id(&self) -> CorrelationId {
        self.ids.next()
    }

    fn hooks(&self) -> HookSet {
        self.observer.hooks()
    }

    /// Run `f` against the observer if it implements `hook`.
    pub(crate) fn notify(&self, hook: Hook, f: impl FnOnce(&dyn Observer)) {
        if self.hooks().contains(hook) {
            f(self.observer.as_ref());
        }
    }

    /// Open a trace if the observer implements `hook`.
    pub(crate) fn start_trace(
        &self,
        hook: Hook,
        f: impl FnOnce(&dyn Observer) -> TraceToken,
    ) -> Option<TraceToken> {
        if self.hooks().contains(hook) {
            Some(f(self.observer.as_ref()))
        } else {
            None
        }
    }

    /// Close a trace opened by [`Instrumentation::start_trace`].
    pub(crate) fn finish_trace(
        &self,
        token: Option<TraceToken>,
        rows_id: Option<CorrelationId>,
        err: Option<&DriverError>,
    ) {
        if let Some(token) = token {
            self.observer.query_trace_done(token, rows_id, err);
        }
    }

    /// Settle a traced query: mint the cursor ID on success and close the trace either way.
    pub(crate) fn complete_query(
        &self,
        token: Option<TraceToken>,
        result: DriverResult<Box<dyn Rows>>,
    ) -> DriverResult<(CorrelationId, Box<dyn Rows>)> {
        match result {
            Ok(rows) => {
                let rows_id = self.next_id();
                self.finish_trace(token, Some(rows_id), None);
                Ok((rows_id, rows))
            }
            Err(err) => {
                self.finish_trace(token, None, Some(&err));
                Err(err)
            }
        }
    }
}

/// Context handed to observers for a call that started at `started`.
pub(crate) fn timed(ctx: &Context, started: Instant) -> Context {
    with_timing(ctx, Timing::since(started))
}
