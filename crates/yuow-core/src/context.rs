//! Per-attempt façade handed to unit functions.

use crate::errors::Result;
use crate::mapper::Entity;
use crate::provider::Executor;
use crate::repository::{Repository, RepositoryConstructor};
use crate::state::SharedState;
use crate::transaction::Transaction;

/// Binds one transaction to repository construction.
///
/// Every `get_repository` call builds a new repository with its own
/// identity map; keep the returned value to share tracking within a unit.
pub struct Context<'t, S = ()> {
    tx: &'t dyn Transaction<S>,
}

impl<'t, S: 'static> Context<'t, S> {
    pub fn new(tx: &'t dyn Transaction<S>) -> Self {
        Self { tx }
    }

    pub fn get_repository<E, C>(&self, constructor: &C) -> Repository<'t, E, C::Mapper, S>
    where
        E: Entity,
        C: RepositoryConstructor<E>,
    {
        Repository::new(self.tx, constructor.repository_name(), constructor.data_mapper())
    }

    /// Flush tracked changes now instead of at the end of the unit
    ///
    /// # Errors
    ///
    /// Returns the first flush failure; the runner then rolls back.
    pub fn flush(&self) -> Result<()> {
        self.tx.flush()
    }

    pub fn state(&self) -> &'t SharedState<S> {
        self.tx.state()
    }

    /// Executor for ad-hoc queries on the unit's connection
    ///
    /// # Errors
    ///
    /// Returns `UowError::TransactionClosed` once the transaction has ended.
    pub fn executor(&self) -> Result<&'t dyn Executor> {
        self.tx.executor()
    }

    pub fn transaction(&self) -> &'t dyn Transaction<S> {
        self.tx
    }
}
