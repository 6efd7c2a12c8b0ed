//! Identity-map keys.

use serde_json::Value;
use std::fmt;

/// Identity extracted from an entity: one value or an ordered composite
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Single(Value),
    Composite(Vec<Value>),
}

impl Identity {
    /// Build from the values of the identity paths, in declaration order
    pub fn from_parts(mut parts: Vec<Value>) -> Self {
        if parts.len() == 1 {
            Identity::Single(parts.remove(0))
        } else {
            Identity::Composite(parts)
        }
    }

    /// Ordered identity values
    pub fn parts(&self) -> Vec<&Value> {
        match self {
            Identity::Single(value) => vec![value],
            Identity::Composite(values) => values.iter().collect(),
        }
    }

    /// Canonical identity-map key.
    ///
    /// Compact JSON of the value (or of the ordered tuple), with a
    /// one-element composite keyed exactly like its bare value.
    pub fn key(&self) -> String {
        match self {
            Identity::Single(value) => value.to_string(),
            Identity::Composite(values) if values.len() == 1 => values[0].to_string(),
            Identity::Composite(values) => Value::Array(values.clone()).to_string(),
        }
    }
}

impl From<Value> for Identity {
    fn from(value: Value) -> Self {
        Identity::Single(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Single(Value::from(value))
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Single(Value::from(value))
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Single(Value::from(value))
    }
}

impl From<Vec<Value>> for Identity {
    fn from(values: Vec<Value>) -> Self {
        Identity::Composite(values)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bare strings print unquoted in error messages
        match self {
            Identity::Single(Value::String(s)) => f.write_str(s),
            _ => f.write_str(&self.key()),
        }
    }
}
