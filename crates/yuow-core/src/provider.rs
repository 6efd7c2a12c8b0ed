//! Query/transaction provider interface.
//!
//! The kernel never talks to a driver directly. A provider implements
//! `Database` for its connection and `DbTransaction` for an open transaction;
//! both execute the `query` model through `Executor`.

use crate::errors::{Result, UowError};
use crate::query::{Filter, Record, Select};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction isolation level requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    #[serde(rename = "read uncommitted")]
    ReadUncommitted,
    #[default]
    #[serde(rename = "read committed")]
    ReadCommitted,
    #[serde(rename = "repeatable read")]
    RepeatableRead,
    #[serde(rename = "serializable")]
    Serializable,
    #[serde(rename = "snapshot")]
    Snapshot,
}

impl IsolationLevel {
    pub const ALL: [IsolationLevel; 5] = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
        IsolationLevel::Snapshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "read uncommitted",
            IsolationLevel::ReadCommitted => "read committed",
            IsolationLevel::RepeatableRead => "repeatable read",
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = UowError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        IsolationLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| UowError::config(format!("unknown isolation level '{s}'")))
    }
}

/// Executes the query model. Write methods return the affected row count.
pub trait Executor {
    /// # Errors
    ///
    /// Returns `UowError::Query` when the provider fails.
    fn select(&self, select: &Select) -> Result<Vec<Record>>;

    /// # Errors
    ///
    /// Returns `UowError::Query` when the provider fails.
    fn insert(&self, table: &str, record: &Record) -> Result<u64>;

    /// # Errors
    ///
    /// Returns `UowError::Query` when the provider fails.
    fn update(&self, table: &str, values: &Record, filter: &Filter) -> Result<u64>;

    /// # Errors
    ///
    /// Returns `UowError::Query` when the provider fails.
    fn delete(&self, table: &str, filter: &Filter) -> Result<u64>;
}

/// A connection that can run statements directly and open transactions
pub trait Database: Executor {
    /// This connection as a plain executor
    fn executor(&self) -> &dyn Executor;

    /// Open a database transaction
    ///
    /// # Errors
    ///
    /// Returns `UowError::Query` when the transaction cannot be started.
    fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn DbTransaction + '_>>;
}

/// An open database transaction
pub trait DbTransaction: Executor {
    fn executor(&self) -> &dyn Executor;

    /// # Errors
    ///
    /// Returns `UowError::Query` when the commit fails.
    fn commit(self: Box<Self>) -> Result<()>;

    /// # Errors
    ///
    /// Returns `UowError::Query` when the rollback fails.
    fn rollback(self: Box<Self>) -> Result<()>;
}

impl<T: Executor + ?Sized> Executor for &T {
    fn select(&self, select: &Select) -> Result<Vec<Record>> {
        (**self).select(select)
    }

    fn insert(&self, table: &str, record: &Record) -> Result<u64> {
        (**self).insert(table, record)
    }

    fn update(&self, table: &str, values: &Record, filter: &Filter) -> Result<u64> {
        (**self).update(table, values, filter)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        (**self).delete(table, filter)
    }
}

/// Lets a runner borrow a database the caller keeps using elsewhere
impl<T: Database + ?Sized> Database for &T {
    fn executor(&self) -> &dyn Executor {
        (**self).executor()
    }

    fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn DbTransaction + '_>> {
        (**self).begin(isolation)
    }
}
