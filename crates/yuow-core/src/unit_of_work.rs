//! The unit-of-work runner.
//!
//! Each attempt builds a fresh transaction and context, runs the unit
//! function, flushes and commits. Failed attempts roll back; optimistic
//! concurrency conflicts re-run the whole unit while attempts remain.

use crate::config::{UowConfig, UowOptions};
use crate::context::Context;
use crate::errors::{Result, UowError};
use crate::provider::Database;
use crate::state::SharedState;
use crate::transaction::{GlobalTransaction, LocalTransaction, Transaction};
use crate::{log_op_end, log_op_error, log_op_start};
use std::time::Instant;
use tracing::{info_span, warn};
use yuow_core_types::AttemptContext;

/// Decides whether a failed attempt is re-run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Only persistence conflicts are retried, and only while `attempt`
    /// (1-based) is below the bound
    pub fn should_retry(&self, err: &UowError, attempt: u32) -> bool {
        err.is_conflict() && attempt < self.max_attempts
    }
}

pub struct UnitOfWork<D> {
    db: D,
    config: UowConfig,
}

impl<D: Database> UnitOfWork<D> {
    pub fn new(db: D) -> Self {
        Self {
            db,
            config: UowConfig::default(),
        }
    }

    /// # Errors
    ///
    /// Returns `UowError::Config` when the configuration is invalid.
    pub fn with_config(db: D, config: UowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { db, config })
    }

    pub fn config(&self) -> &UowConfig {
        &self.config
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn into_inner(self) -> D {
        self.db
    }

    /// Run `unit` with the runner's defaults
    ///
    /// # Errors
    ///
    /// Returns the unit's own error, a flush/commit failure, or the last
    /// `PersistenceError` once attempts are exhausted.
    pub fn run<R, F>(&self, unit: F) -> Result<R>
    where
        F: FnMut(&Context<'_, ()>) -> Result<R>,
    {
        self.run_with(UowOptions::new(), unit)
    }

    /// Run `unit` with per-call options
    ///
    /// # Errors
    ///
    /// Returns the unit's own error, a flush/commit failure, the last
    /// `PersistenceError` once attempts are exhausted, or `UowError::Config`
    /// for invalid options.
    pub fn run_with<S, R, F>(&self, options: UowOptions<S>, mut unit: F) -> Result<R>
    where
        S: Clone + 'static,
        F: FnMut(&Context<'_, S>) -> Result<R>,
    {
        let config = options.resolve(&self.config);
        config.validate()?;
        let policy = RetryPolicy::new(config.max_attempts);
        let mut attempt = AttemptContext::first(config.max_attempts);

        loop {
            let span = info_span!(
                "unit_of_work",
                unit_id = %attempt.unit_id,
                attempt = attempt.attempt,
            );
            let _guard = span.enter();
            let start = Instant::now();
            log_op_start!(
                "unit_of_work",
                global = config.global_transaction,
                isolation = %config.isolation_level,
                max_attempts = config.max_attempts,
            );

            match self.attempt(&config, &options, &mut unit) {
                Ok(value) => {
                    log_op_end!("unit_of_work", duration_ms = start.elapsed().as_millis() as u64);
                    return Ok(value);
                }
                Err(err) => {
                    log_op_error!("unit_of_work", err, duration_ms = start.elapsed().as_millis() as u64);
                    if !policy.should_retry(&err, attempt.attempt) {
                        return Err(err);
                    }
                    warn!(
                        error = %err,
                        next_attempt = attempt.attempt + 1,
                        "conflict detected; retrying unit"
                    );
                    attempt = attempt.next();
                }
            }
        }
    }

    fn attempt<S, R, F>(&self, config: &UowConfig, options: &UowOptions<S>, unit: &mut F) -> Result<R>
    where
        S: Clone + 'static,
        F: FnMut(&Context<'_, S>) -> Result<R>,
    {
        let state = SharedState::new(options.initial_state.clone());
        let mut tx: Box<dyn Transaction<S> + '_> = if config.global_transaction {
            Box::new(GlobalTransaction::begin(&self.db, config.isolation_level, state)?)
        } else {
            Box::new(LocalTransaction::new(&self.db, config.isolation_level, state))
        };
        options.register(tx.events());

        let outcome = {
            let context = Context::new(tx.as_ref());
            unit(&context).and_then(|value| context.flush().map(|()| value))
        };
        let outcome = outcome.and_then(|value| tx.commit().map(|()| value));

        if outcome.is_err() {
            if let Err(rollback_err) = tx.rollback() {
                warn!(error = %rollback_err, "rollback after failed attempt failed");
            }
        }
        outcome
    }
}
