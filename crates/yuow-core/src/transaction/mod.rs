//! Transaction strategies and their lifecycle.
//!
//! Phases: `Active -> {Flushing -> Active}* -> Committed | RolledBack`.
//! Flush listeners are fallible and abort the flush; commit and rollback
//! listeners are best-effort.

pub mod global;
pub mod local;

pub use global::GlobalTransaction;
pub use local::LocalTransaction;

use crate::errors::{Result, UowError};
use crate::events::EventChannel;
use crate::provider::{Executor, IsolationLevel};
use crate::state::SharedState;
use std::cell::Cell;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Active,
    Flushing,
    Committed,
    RolledBack,
}

impl TransactionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionPhase::Active => "active",
            TransactionPhase::Flushing => "flushing",
            TransactionPhase::Committed => "committed",
            TransactionPhase::RolledBack => "rolled back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionPhase::Committed | TransactionPhase::RolledBack)
    }
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type FlushListener = dyn Fn(&dyn Executor) -> Result<()>;
pub type StateListener<S> = dyn Fn(&SharedState<S>) -> Result<()>;

/// Event channels every transaction exposes
pub struct TransactionEvents<S> {
    pub flush: EventChannel<FlushListener>,
    pub commit: EventChannel<StateListener<S>>,
    pub rollback: EventChannel<StateListener<S>>,
}

impl<S> TransactionEvents<S> {
    fn new() -> Self {
        Self {
            flush: EventChannel::new("flush"),
            commit: EventChannel::new("commit"),
            rollback: EventChannel::new("rollback"),
        }
    }
}

pub trait Transaction<S> {
    /// Executor for reads inside the unit
    ///
    /// # Errors
    ///
    /// Returns `UowError::TransactionClosed` once the transaction has ended.
    fn executor(&self) -> Result<&dyn Executor>;

    /// Emit `flush` so tracked changes are written
    ///
    /// # Errors
    ///
    /// Returns the first flush listener error, a provider error, or
    /// `UowError::TransactionClosed` outside the active phase.
    fn flush(&self) -> Result<()>;

    /// # Errors
    ///
    /// Returns a provider error or `UowError::TransactionClosed`.
    fn commit(&mut self) -> Result<()>;

    /// Rolling back an already rolled back transaction is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a provider error, or `UowError::TransactionClosed` after commit.
    fn rollback(&mut self) -> Result<()>;

    fn events(&self) -> &TransactionEvents<S>;

    fn state(&self) -> &SharedState<S>;

    fn isolation_level(&self) -> IsolationLevel;

    fn phase(&self) -> TransactionPhase;
}

/// Phase, events and state shared by both strategies
pub(crate) struct TransactionCore<S> {
    phase: Cell<TransactionPhase>,
    events: TransactionEvents<S>,
    state: SharedState<S>,
    isolation: IsolationLevel,
}

impl<S> TransactionCore<S> {
    pub fn new(isolation: IsolationLevel, state: SharedState<S>) -> Self {
        Self {
            phase: Cell::new(TransactionPhase::Active),
            events: TransactionEvents::new(),
            state,
            isolation,
        }
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase.get()
    }

    pub fn set_phase(&self, phase: TransactionPhase) {
        self.phase.set(phase);
    }

    pub fn events(&self) -> &TransactionEvents<S> {
        &self.events
    }

    pub fn state(&self) -> &SharedState<S> {
        &self.state
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn closed(&self, op: &str) -> UowError {
        UowError::TransactionClosed {
            op: op.to_string(),
            phase: self.phase().to_string(),
        }
    }

    /// # Errors
    ///
    /// Returns `UowError::TransactionClosed` unless the phase is `Active`.
    pub fn ensure_active(&self, op: &str) -> Result<()> {
        if self.phase() == TransactionPhase::Active {
            Ok(())
        } else {
            Err(self.closed(op))
        }
    }

    /// # Errors
    ///
    /// Returns `UowError::TransactionClosed` once the phase is terminal.
    pub fn ensure_open(&self, op: &str) -> Result<()> {
        if self.phase().is_terminal() {
            Err(self.closed(op))
        } else {
            Ok(())
        }
    }

    /// Dispatch `flush` against `exec`, returning to `Active` afterwards
    ///
    /// # Errors
    ///
    /// Returns the first flush listener error.
    pub fn run_flush(&self, exec: &dyn Executor) -> Result<()> {
        self.ensure_active("flush")?;
        self.set_phase(TransactionPhase::Flushing);
        debug!(listeners = self.events.flush.len(), "flush dispatch");
        let outcome = self.events.flush.dispatch(|listener| listener(exec));
        self.set_phase(TransactionPhase::Active);
        outcome
    }

    pub fn emit_commit(&self) {
        self.events.commit.notify(|listener| listener(&self.state));
    }

    pub fn emit_rollback(&self) {
        self.events.rollback.notify(|listener| listener(&self.state));
    }
}
