use super::{Transaction, TransactionCore, TransactionEvents, TransactionPhase};
use crate::errors::Result;
use crate::provider::{Database, Executor, IsolationLevel};
use crate::state::SharedState;
use tracing::{debug, warn};

/// No surrounding database transaction; each flush gets its own.
///
/// Reads inside the unit use the ambient connection. `flush` opens a
/// short-lived transaction at the configured isolation level and commits it
/// once every flush listener succeeded.
pub struct LocalTransaction<'db, S> {
    core: TransactionCore<S>,
    db: &'db dyn Database,
}

impl<'db, S> LocalTransaction<'db, S> {
    pub fn new(db: &'db dyn Database, isolation: IsolationLevel, state: SharedState<S>) -> Self {
        Self {
            core: TransactionCore::new(isolation, state),
            db,
        }
    }
}

impl<S> Transaction<S> for LocalTransaction<'_, S> {
    fn executor(&self) -> Result<&dyn Executor> {
        self.core.ensure_open("execute")?;
        Ok(self.db.executor())
    }

    fn flush(&self) -> Result<()> {
        self.core.ensure_active("flush")?;
        let inner = self.db.begin(self.core.isolation())?;
        match self.core.run_flush(inner.executor()) {
            Ok(()) => {
                inner.commit()?;
                debug!(isolation = %self.core.isolation(), "local flush committed");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = inner.rollback() {
                    warn!(error = %rollback_err, "local flush rollback failed");
                }
                Err(err)
            }
        }
    }

    fn commit(&mut self) -> Result<()> {
        self.core.ensure_active("commit")?;
        self.core.set_phase(TransactionPhase::Committed);
        self.core.emit_commit();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        match self.core.phase() {
            TransactionPhase::RolledBack => Ok(()),
            TransactionPhase::Committed => Err(self.core.closed("rollback")),
            TransactionPhase::Active | TransactionPhase::Flushing => {
                self.core.set_phase(TransactionPhase::RolledBack);
                self.core.emit_rollback();
                Ok(())
            }
        }
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
