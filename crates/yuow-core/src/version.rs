//! Optimistic version stamps kept alongside tracked entities.

use crate::errors::{Result, UowError};

/// Monotonic version counter for one tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionStamp(u64);

impl VersionStamp {
    pub const INITIAL: u64 = 1;

    /// Stamp for an entity that has never been stored
    pub fn new() -> Self {
        Self(Self::INITIAL)
    }

    /// Seed from a stored row, skipping the monotonicity check
    pub fn loaded(version: u64) -> Self {
        Self(version)
    }

    pub fn current(&self) -> u64 {
        self.0
    }

    /// The value an update writes
    pub fn next(&self) -> u64 {
        self.0 + 1
    }

    /// Move the stamp to `version`. Every version change after load goes
    /// through here, including the bump after a successful update; custom
    /// mappers should use it too.
    ///
    /// # Errors
    ///
    /// Returns `UowError::VersionRegression` when `version` is lower than
    /// the current value.
    pub fn set(&mut self, version: u64) -> Result<()> {
        if version < self.0 {
            return Err(UowError::VersionRegression {
                current: self.0,
                requested: version,
            });
        }
        self.0 = version;
        Ok(())
    }
}

impl Default for VersionStamp {
    fn default() -> Self {
        Self::new()
    }
}
