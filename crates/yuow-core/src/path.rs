//! Dotted-path access into an entity's structural image.
//!
//! Entities are read and written through their `serde_json::Value` image, so
//! a path like `state.address.city` or `lines.0.sku` addresses a field
//! without the entity exposing accessors for it.

use crate::errors::{Result, UowError};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A parsed, non-empty dotted path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parse a dotted path
    ///
    /// # Errors
    ///
    /// Returns `UowError::Path` when the path or any segment is empty.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(UowError::path(raw, "path is empty"));
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(UowError::path(raw, "path contains an empty segment"));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl FromStr for PropertyPath {
    type Err = UowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_index(path: &PropertyPath, segment: &str) -> Result<usize> {
    segment.parse::<usize>().map_err(|_| {
        UowError::path(
            path.as_str(),
            format!("segment '{segment}' is not an array index"),
        )
    })
}

fn not_container(path: &PropertyPath, segment: &str) -> UowError {
    UowError::path(
        path.as_str(),
        format!("cannot descend into '{segment}': value is not an object or array"),
    )
}

/// Read the value at `path`
///
/// Returns `Ok(None)` when a segment is missing, an intermediate is `null`,
/// or an array index is out of range.
///
/// # Errors
///
/// Returns `UowError::Path` when an intermediate value is a scalar, or when
/// an array is addressed with a non-numeric segment.
pub fn extract<'v>(object: &'v Value, path: &PropertyPath) -> Result<Option<&'v Value>> {
    let mut current = object;
    for segment in path.segments() {
        current = match current {
            Value::Null => return Ok(None),
            Value::Object(map) => match map.get(segment) {
                Some(value) => value,
                None => return Ok(None),
            },
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                match items.get(index) {
                    Some(value) => value,
                    None => return Ok(None),
                }
            }
            _ => return Err(not_container(path, segment)),
        };
    }
    Ok(Some(current))
}

/// Write `value` at `path`, creating intermediate objects as needed
///
/// A `null` root or intermediate becomes an empty object. An array segment
/// may address an existing index or the position just past the end, which
/// appends.
///
/// # Errors
///
/// Returns `UowError::Path` when an intermediate value is a scalar, or when
/// an array segment is not an index or lies beyond the append position.
pub fn put(object: &mut Value, path: &PropertyPath, value: Value) -> Result<()> {
    let segments = path.segments();
    let mut current = object;

    for (position, segment) in segments.iter().enumerate() {
        let last = position + 1 == segments.len();
        if current.is_null() {
            *current = Value::Object(Map::new());
        }

        current = match current {
            Value::Object(map) => {
                if last {
                    map.insert(segment.clone(), value);
                    return Ok(());
                }
                map.entry(segment.clone()).or_insert(Value::Null)
            }
            Value::Array(items) => {
                let index = parse_index(path, segment)?;
                if index > items.len() {
                    return Err(UowError::path(
                        path.as_str(),
                        format!("index {index} is beyond the end of an array of {}", items.len()),
                    ));
                }
                if index == items.len() {
                    items.push(Value::Null);
                }
                if last {
                    items[index] = value;
                    return Ok(());
                }
                &mut items[index]
            }
            _ => return Err(not_container(path, segment)),
        };
    }

    // Segments are never empty, so the loop always returns
    Ok(())
}
