use super::{Transaction, TransactionCore, TransactionEvents, TransactionPhase};
use crate::errors::Result;
use crate::provider::{Database, DbTransaction, Executor, IsolationLevel};
use crate::state::SharedState;
use tracing::debug;

/// One database transaction spanning the whole unit.
///
/// Reads inside the unit and every flush run on the same database
/// transaction, which is committed or rolled back with the unit.
pub struct GlobalTransaction<'db, S> {
    core: TransactionCore<S>,
    handle: Option<Box<dyn DbTransaction + 'db>>,
}

impl<'db, S> GlobalTransaction<'db, S> {
    /// Open the database transaction
    ///
    /// # Errors
    ///
    /// Returns the provider error when the transaction cannot be started.
    pub fn begin(db: &'db dyn Database, isolation: IsolationLevel, state: SharedState<S>) -> Result<Self> {
        let handle = db.begin(isolation)?;
        debug!(isolation = %isolation, "global transaction begun");
        Ok(Self {
            core: TransactionCore::new(isolation, state),
            handle: Some(handle),
        })
    }

    fn handle(&self, op: &str) -> Result<&(dyn DbTransaction + 'db)> {
        self.handle.as_deref().ok_or_else(|| self.core.closed(op))
    }
}

impl<S> Transaction<S> for GlobalTransaction<'_, S> {
    fn executor(&self) -> Result<&dyn Executor> {
        Ok(self.handle("execute")?.executor())
    }

    fn flush(&self) -> Result<()> {
        self.core.ensure_active("flush")?;
        self.core.run_flush(self.handle("flush")?.executor())
    }

    fn commit(&mut self) -> Result<()> {
        self.core.ensure_active("commit")?;
        let handle = self.handle.take().ok_or_else(|| self.core.closed("commit"))?;
        // A failed commit leaves the phase Active without a handle, so the
        // following rollback only settles the phase and notifies.
        handle.commit()?;
        self.core.set_phase(TransactionPhase::Committed);
        debug!("global transaction committed");
        self.core.emit_commit();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        match self.core.phase() {
            TransactionPhase::RolledBack => return Ok(()),
            TransactionPhase::Committed => return Err(self.core.closed("rollback")),
            TransactionPhase::Active | TransactionPhase::Flushing => {}
        }
        self.core.set_phase(TransactionPhase::RolledBack);
        let outcome = match self.handle.take() {
            Some(handle) => handle.rollback(),
            None => Ok(()),
        };
        debug!(ok = outcome.is_ok(), "global transaction rolled back");
        self.core.emit_rollback();
        outcome
    }

    fn events(&self) -> &TransactionEvents<S> {
        self.core.events()
    }

    fn state(&self) -> &SharedState<S> {
        self.core.state()
    }

    fn isolation_level(&self) -> IsolationLevel {
        self.core.isolation()
    }

    fn phase(&self) -> TransactionPhase {
        self.core.phase()
    }
}
