//! Conversion between JSON record values and SQLite values

use crate::errors::{invalid_column, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};
use yuow_core::errors::UowError;

/// Bind a record value as a SQLite parameter.
///
/// Booleans become 0/1, arrays and objects are stored as JSON text.
pub fn to_sql(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                SqlValue::Integer(int)
            } else if let Some(float) = n.as_f64().filter(|_| n.is_f64()) {
                SqlValue::Real(float)
            } else {
                return Err(UowError::query(
                    "bind",
                    format!("integer {n} does not fit in a SQLite INTEGER"),
                ));
            }
        }
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(serde_json::to_string(value)?),
    })
}

/// Read a stored column back into a record value
pub fn from_sql(table: &str, column: &str, value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => Value::from(int),
        ValueRef::Real(float) => Number::from_f64(float)
            .map(Value::Number)
            .ok_or_else(|| invalid_column(table, column, format!("non-finite real {float}")))?,
        ValueRef::Text(bytes) => Value::String(
            std::str::from_utf8(bytes)
                .map_err(|e| invalid_column(table, column, e))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    })
}
