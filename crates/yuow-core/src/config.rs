//! Runner configuration.

use crate::errors::{Result, UowError};
use crate::provider::{Executor, IsolationLevel};
use crate::state::SharedState;
use crate::transaction::{FlushListener, StateListener, TransactionEvents};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

fn default_max_attempts() -> u32 {
    3
}

/// Defaults a `UnitOfWork` applies to every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UowConfig {
    /// One database transaction around the whole unit instead of one per flush
    pub global_transaction: bool,
    pub isolation_level: IsolationLevel,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for UowConfig {
    fn default() -> Self {
        Self {
            global_transaction: false,
            isolation_level: IsolationLevel::default(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl UowConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `UowError::Config` for malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| UowError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `UowError::Config` when `max_attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(UowError::config("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Per-run overrides, initial state and lifecycle listeners
pub struct UowOptions<S = ()> {
    pub(crate) initial_state: S,
    global_transaction: Option<bool>,
    isolation_level: Option<IsolationLevel>,
    max_attempts: Option<u32>,
    on_flush: Option<Rc<FlushListener>>,
    on_commit: Option<Rc<StateListener<S>>>,
    on_rollback: Option<Rc<StateListener<S>>>,
}

impl UowOptions<()> {
    pub fn new() -> Self {
        Self::with_state(())
    }
}

impl Default for UowOptions<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> UowOptions<S> {
    /// Options whose attempts each start from a clone of `state`
    pub fn with_state(state: S) -> Self {
        Self {
            initial_state: state,
            global_transaction: None,
            isolation_level: None,
            max_attempts: None,
            on_flush: None,
            on_commit: None,
            on_rollback: None,
        }
    }

    pub fn global_transaction(mut self, global: bool) -> Self {
        self.global_transaction = Some(global);
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn on_flush<F>(mut self, listener: F) -> Self
    where
        F: Fn(&dyn Executor) -> Result<()> + 'static,
    {
        self.on_flush = Some(Rc::new(listener));
        self
    }

    pub fn on_commit<F>(mut self, listener: F) -> Self
    where
        F: Fn(&SharedState<S>) -> Result<()> + 'static,
    {
        self.on_commit = Some(Rc::new(listener));
        self
    }

    pub fn on_rollback<F>(mut self, listener: F) -> Self
    where
        F: Fn(&SharedState<S>) -> Result<()> + 'static,
    {
        self.on_rollback = Some(Rc::new(listener));
        self
    }

    /// `base` with this run's overrides applied
    pub fn resolve(&self, base: &UowConfig) -> UowConfig {
        UowConfig {
            global_transaction: self.global_transaction.unwrap_or(base.global_transaction),
            isolation_level: self.isolation_level.unwrap_or(base.isolation_level),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
        }
    }

    pub(crate) fn register(&self, events: &TransactionEvents<S>) {
        if let Some(listener) = &self.on_flush {
            events.flush.subscribe(Rc::clone(listener));
        }
        if let Some(listener) = &self.on_commit {
            events.commit.subscribe(Rc::clone(listener));
        }
        if let Some(listener) = &self.on_rollback {
            events.rollback.subscribe(Rc::clone(listener));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UowConfig::default();
        assert!(!config.global_transaction);
        assert_eq!(config.isolation_level, IsolationLevel::ReadCommitted);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = UowConfig::from_toml_str(
            r#"
            global_transaction = true
            isolation_level = "serializable"
            "#,
        )
        .unwrap();

        assert!(config.global_transaction);
        assert_eq!(config.isolation_level, IsolationLevel::Serializable);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_from_toml_rejects_zero_attempts() {
        let err = UowConfig::from_toml_str("max_attempts = 0").unwrap_err();
        assert_eq!(err.code(), "ERR_CONFIG");
    }

    #[test]
    fn test_from_toml_rejects_unknown_isolation() {
        assert!(UowConfig::from_toml_str("isolation_level = \"eventual\"").is_err());
    }

    #[test]
    fn test_options_override_base() {
        let base = UowConfig::default();
        let resolved = UowOptions::new()
            .max_attempts(7)
            .global_transaction(true)
            .resolve(&base);

        assert_eq!(resolved.max_attempts, 7);
        assert!(resolved.global_transaction);
        assert_eq!(resolved.isolation_level, base.isolation_level);
    }
}
