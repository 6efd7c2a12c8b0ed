//! Correlation types for unit-of-work tracking
//!
//! Every `run` invocation gets a `UnitId`; each retry of that invocation is
//! distinguished by its attempt number. Both are attached to the logging span
//! of the attempt so all statements of one unit can be correlated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single unit-of-work invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(String);

impl UnitId {
    /// Generate a new UnitId using UUIDv7 (time ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation context of one attempt of a unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    pub unit_id: UnitId,
    /// 1-based attempt number
    pub attempt: u32,
    pub max_attempts: u32,
}

impl AttemptContext {
    /// Context of the first attempt of a fresh unit
    pub fn first(max_attempts: u32) -> Self {
        Self {
            unit_id: UnitId::new(),
            attempt: 1,
            max_attempts,
        }
    }

    /// Context of the following attempt of the same unit
    pub fn next(&self) -> Self {
        Self {
            unit_id: self.unit_id.clone(),
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
        }
    }

    /// Whether another attempt is allowed after this one
    pub fn has_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_generation() {
        let id1 = UnitId::new();
        let id2 = UnitId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_unit_id_display() {
        let id = UnitId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_attempt_context_progression() {
        let first = AttemptContext::first(3);
        assert_eq!(first.attempt, 1);
        assert!(first.has_remaining());

        let second = first.next();
        assert_eq!(second.unit_id, first.unit_id);
        assert_eq!(second.attempt, 2);

        let third = second.next();
        assert!(!third.has_remaining());
    }

    #[test]
    fn test_single_attempt_has_no_remaining() {
        assert!(!AttemptContext::first(1).has_remaining());
    }

    #[test]
    fn test_serialization() {
        let id = UnitId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: UnitId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
