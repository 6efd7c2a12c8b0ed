//! Per-field transforms between an entity image and a stored record.

use crate::errors::{Result, UowError};
use crate::path::PropertyPath;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;

/// A single stored column and its value transform
pub trait Property: Send + Sync {
    /// Stored column name
    fn name(&self) -> &str;

    /// Domain value to stored value
    ///
    /// # Errors
    ///
    /// Returns `UowError::Serialization` when the value has the wrong shape.
    fn to_stored(&self, value: Value) -> Result<Value>;

    /// Stored value to domain value
    ///
    /// # Errors
    ///
    /// Returns `UowError::Serialization` when the stored value has the wrong shape.
    fn from_stored(&self, value: Value) -> Result<Value>;
}

/// Pass-through column
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Property for Column {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_stored(&self, value: Value) -> Result<Value> {
        Ok(value)
    }

    fn from_stored(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}

/// Structured value stored as JSON text
#[derive(Debug, Clone)]
pub struct JsonColumn {
    name: String,
}

impl JsonColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Property for JsonColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_stored(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::String(serde_json::to_string(&value)?))
    }

    fn from_stored(&self, value: Value) -> Result<Value> {
        match value {
            Value::String(text) => Ok(serde_json::from_str(&text)?),
            // Providers with a native JSON type hand back structured values
            other => Ok(other),
        }
    }
}

/// Boolean stored as integer 0/1
#[derive(Debug, Clone)]
pub struct BoolColumn {
    name: String,
}

impl BoolColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Property for BoolColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_stored(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(flag) => Ok(Value::from(i64::from(flag))),
            other => Err(UowError::serialization(format!(
                "column '{}' expects a boolean, got {other}",
                self.name
            ))),
        }
    }

    fn from_stored(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Bool(_) => Ok(value),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|x| x != 0.0))),
            other => Err(UowError::serialization(format!(
                "column '{}' holds a non-integer flag {other}",
                self.name
            ))),
        }
    }
}

/// RFC 3339 timestamp stored as Unix epoch milliseconds
///
/// Storage is lossy: sub-millisecond digits are truncated and any offset is
/// normalized, so a load yields `YYYY-MM-DDTHH:MM:SS.mmmZ` in UTC. An entity
/// holding a nanosecond `DateTime<Utc>` or a non-UTC offset hydrates to a
/// different value than it saved.
#[derive(Debug, Clone)]
pub struct TimestampColumn {
    name: String,
}

impl TimestampColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Property for TimestampColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_stored(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(text) => {
                let parsed = DateTime::parse_from_rfc3339(&text).map_err(|e| {
                    UowError::serialization(format!("column '{}': {e}", self.name))
                })?;
                Ok(Value::from(parsed.timestamp_millis()))
            }
            other => Err(UowError::serialization(format!(
                "column '{}' expects an RFC 3339 string, got {other}",
                self.name
            ))),
        }
    }

    fn from_stored(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => {
                let millis = n.as_i64().ok_or_else(|| {
                    UowError::serialization(format!(
                        "column '{}' holds a non-integer timestamp {n}",
                        self.name
                    ))
                })?;
                let at = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                    UowError::serialization(format!(
                        "column '{}' timestamp {millis} is out of range",
                        self.name
                    ))
                })?;
                Ok(Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
            other => Err(UowError::serialization(format!(
                "column '{}' holds a non-numeric timestamp {other}",
                self.name
            ))),
        }
    }
}

type Transform = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Column with caller-supplied transforms
pub struct MappedColumn {
    name: String,
    to: Transform,
    from: Transform,
}

impl MappedColumn {
    pub fn new<T, F>(name: impl Into<String>, to_stored: T, from_stored: F) -> Self
    where
        T: Fn(Value) -> Result<Value> + Send + Sync + 'static,
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            to: Box::new(to_stored),
            from: Box::new(from_stored),
        }
    }
}

impl Property for MappedColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_stored(&self, value: Value) -> Result<Value> {
        (self.to)(value)
    }

    fn from_stored(&self, value: Value) -> Result<Value> {
        (self.from)(value)
    }
}

/// A property bound to its path in the entity image
#[derive(Clone)]
pub struct BoundProperty {
    pub path: PropertyPath,
    pub property: Arc<dyn Property>,
}

impl BoundProperty {
    pub fn column(&self) -> &str {
        self.property.name()
    }
}

/// Insertion-ordered `path -> property` declaration.
///
/// Paths are kept raw here and validated when the map is handed to
/// `Schema::new`, so declarations read as a single builder chain.
#[derive(Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, Arc<dyn Property>)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, property: impl Property + 'static) -> Self {
        self.entries.push((path.into(), Arc::new(property)));
        self
    }

    /// Shorthand for a pass-through `Column`
    pub fn column(self, path: impl Into<String>, column: impl Into<String>) -> Self {
        self.with(path, Column::new(column))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored column name for an entity path
    pub fn column_of(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, prop)| prop.name())
    }

    /// Entity path for a stored column name
    pub fn path_of(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, prop)| prop.name() == column)
            .map(|(p, _)| p.as_str())
    }

    pub(crate) fn entries(&self) -> &[(String, Arc<dyn Property>)] {
        &self.entries
    }
}
