use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Result type alias using UowError
pub type Result<T> = std::result::Result<T, UowError>;

/// Boxed error carried by business and provider failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, log assertions and external reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Mapping
    Path,
    Serialization,
    InvalidRecord,
    VersionRegression,

    // Flush
    PersistenceConflict,

    // Provider
    Query,

    // Lifecycle
    TransactionClosed,
    Config,

    // Caller
    Business,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Path => "ERR_PATH",
            ErrorKind::Serialization => "ERR_SERIALIZATION",
            ErrorKind::InvalidRecord => "ERR_INVALID_RECORD",
            ErrorKind::VersionRegression => "ERR_VERSION_REGRESSION",
            ErrorKind::PersistenceConflict => "ERR_PERSISTENCE_CONFLICT",
            ErrorKind::Query => "ERR_QUERY",
            ErrorKind::TransactionClosed => "ERR_TRANSACTION_CLOSED",
            ErrorKind::Config => "ERR_CONFIG",
            ErrorKind::Business => "ERR_BUSINESS",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Write operation attempted against the store during a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceOperation {
    Insert,
    Update,
    Delete,
}

impl PersistenceOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceOperation::Insert => "insert",
            PersistenceOperation::Update => "update",
            PersistenceOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for PersistenceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flush write affected zero rows.
///
/// Either another writer advanced the row's version first (a lost optimistic
/// concurrency race) or the row does not exist. The unit-of-work runner
/// retries the whole unit on this error while attempts remain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{repository} cannot perform an {operation} operation on entity with identity \"{identity}\"")]
pub struct PersistenceError {
    pub repository: String,
    pub identity: String,
    pub operation: PersistenceOperation,
}

/// Comprehensive error taxonomy for unit-of-work operations
#[derive(Error, Debug)]
pub enum UowError {
    /// A property or identity path cannot be parsed, resolved or written
    #[error("Path error at '{path}': {reason}")]
    Path { path: String, reason: String },

    /// A flush write affected zero rows
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The query/transaction provider failed
    #[error("Query failed in '{op}': {source}")]
    Query {
        op: String,
        #[source]
        source: BoxError,
    },

    /// Entity could not be converted to or from its structural image
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// A stored record does not have the shape the mapper expects
    #[error("Invalid record in table '{table}': {reason}")]
    InvalidRecord { table: String, reason: String },

    /// Attempt to move a version stamp backwards
    #[error("Version cannot be decreased from {current} to {requested}")]
    VersionRegression { current: u64, requested: u64 },

    /// Invalid schema declaration or runner options
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Transaction used outside the phase that allows the operation
    #[error("Transaction cannot {op} while {phase}")]
    TransactionClosed { op: String, phase: String },

    /// Error raised by the caller's unit function
    #[error("{0}")]
    Business(BoxError),
}

impl UowError {
    /// Wrap an application error raised inside a unit function
    pub fn business(err: impl Into<BoxError>) -> Self {
        UowError::Business(err.into())
    }

    /// Wrap a provider failure for the given operation
    pub fn query(op: impl Into<String>, err: impl Into<BoxError>) -> Self {
        UowError::Query {
            op: op.into(),
            source: err.into(),
        }
    }

    pub fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        UowError::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        UowError::Config {
            reason: reason.into(),
        }
    }

    pub fn serialization(err: impl fmt::Display) -> Self {
        UowError::Serialization {
            message: err.to_string(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            UowError::Path { .. } => ErrorKind::Path,
            UowError::Persistence(_) => ErrorKind::PersistenceConflict,
            UowError::Query { .. } => ErrorKind::Query,
            UowError::Serialization { .. } => ErrorKind::Serialization,
            UowError::InvalidRecord { .. } => ErrorKind::InvalidRecord,
            UowError::VersionRegression { .. } => ErrorKind::VersionRegression,
            UowError::Config { .. } => ErrorKind::Config,
            UowError::TransactionClosed { .. } => ErrorKind::TransactionClosed,
            UowError::Business(_) => ErrorKind::Business,
        }
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True only for zero-rows-affected flush failures
    pub fn is_conflict(&self) -> bool {
        matches!(self, UowError::Persistence(_))
    }

    /// The conflict details, if this is a persistence error
    pub fn as_persistence(&self) -> Option<&PersistenceError> {
        match self {
            UowError::Persistence(err) => Some(err),
            _ => None,
        }
    }

    /// Downcast a business error back to the caller's type
    pub fn downcast_business<T: StdError + 'static>(&self) -> Option<&T> {
        match self {
            UowError::Business(err) => err.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for UowError {
    fn from(err: serde_json::Error) -> Self {
        UowError::serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_message() {
        let err = PersistenceError {
            repository: "customers".to_string(),
            identity: "A".to_string(),
            operation: PersistenceOperation::Update,
        };

        assert_eq!(
            err.to_string(),
            "customers cannot perform an update operation on entity with identity \"A\""
        );
    }

    #[test]
    fn test_only_persistence_is_conflict() {
        let conflict: UowError = PersistenceError {
            repository: "r".to_string(),
            identity: "1".to_string(),
            operation: PersistenceOperation::Delete,
        }
        .into();
        assert!(conflict.is_conflict());
        assert_eq!(conflict.kind(), ErrorKind::PersistenceConflict);

        assert!(!UowError::business("nope").is_conflict());
        assert!(!UowError::query("select", "disk I/O error").is_conflict());
        assert!(!UowError::path("a.b", "not a container").is_conflict());
    }

    #[test]
    fn test_business_downcast() {
        #[derive(Debug, thiserror::Error)]
        #[error("customer not found")]
        struct NotFound;

        let err = UowError::business(NotFound);
        assert!(err.downcast_business::<NotFound>().is_some());
        assert_eq!(err.code(), "ERR_BUSINESS");
        assert_eq!(err.to_string(), "customer not found");
    }

    #[test]
    fn test_query_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = UowError::query("insert", io);

        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk full"));
    }
}
