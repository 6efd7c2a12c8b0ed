//! Error handling for yuow-store
//!
//! Wraps yuow-core `UowError` with store-specific helpers

use yuow_core::errors::UowError;

/// Result type alias using UowError
pub type Result<T> = std::result::Result<T, UowError>;

/// Create a query error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> UowError {
    UowError::query("sqlite", err)
}

/// A stored column that cannot be represented in a record
pub fn invalid_column(table: &str, column: &str, reason: impl std::fmt::Display) -> UowError {
    UowError::InvalidRecord {
        table: table.to_string(),
        reason: format!("column '{column}': {reason}"),
    }
}

/// A statement the provider cannot render
pub fn unsupported(op: &str, reason: &str) -> UowError {
    UowError::query(op, reason.to_string())
}
