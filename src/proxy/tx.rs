//! Transaction wrapper.

use std::time::Instant;

use crate::context::Context;
use crate::driver::{DriverResult, Tx};
use crate::observer::Hook;
use crate::proxy::{timed, Instrumentation};
use crate::sequence::CorrelationId;

pub struct ProxyTx {
    id: CorrelationId,
    tx: Box<dyn Tx>,
    inst: Instrumentation,
}

impl ProxyTx {
    pub(crate) fn new(id: CorrelationId, tx: Box<dyn Tx>, inst: Instrumentation) -> Self {
        Self { id, tx, inst }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }
}

impl Tx for ProxyTx {
    fn commit(self: Box<Self>) -> DriverResult<()> {
        let ProxyTx { id, tx, inst } = *self;
        let started = Instant::now();
        tx.commit()?;

        inst.notify(Hook::TxCommit, |o| o.tx_commit(&timed(&Context::background(), started), id));
        Ok(())
    }

    fn rollback(self: Box<Self>) -> DriverResult<()> {
        let ProxyTx { id, tx, inst } = *self;
        let started = Instant::now();
        tx.rollback()?;

        inst.notify(Hook::TxRollback, |o| o.tx_rollback(&timed(&Context::background(), started), id));
        Ok(())
    }
}
