//! The `Value` type carried through statements, rows, and attribute maps.
//!
//! A `Value` never renders itself into SQL text; statements bind values as
//! named parameters and drivers convert them to their native form
//! immediately before execution.

use serde::{Deserialize, Serialize};

/// A single database value.
///
/// Dates and timestamps ride as ISO-8601 text; structured values (maps and
/// sequences) ride as JSON and are serialized to compact text by drivers
/// whose engine has no native JSON binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Text.
    Text(String),
    /// Calendar date as ISO-8601 text (`YYYY-MM-DD`).
    Date(String),
    /// Timestamp as ISO-8601 text.
    Timestamp(String),
    /// Structured JSON value (object or array).
    Json(serde_json::Value),
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow as text, if this is a textual variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Date(s) | Value::Timestamp(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Extract as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Borrow the JSON payload of a structured value.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }

    /// Compact JSON text for structured values, used by drivers whose
    /// engine binds JSON columns as text.
    pub fn json_text(&self) -> Option<String> {
        match self {
            Value::Json(j) => serde_json::to_string(j).ok(),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from("cash"), Value::Text("cash".to_string()));
        assert_eq!(Value::from(Option::<i64>::None), Value::Null);
        assert_eq!(Value::from(Some(1i32)), Value::Int(1));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Bool(true).as_int(), Some(1));
        assert_eq!(Value::Text("x".into()).as_str(), Some("x"));
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
    }

    #[test]
    fn test_json_text_is_compact() {
        let v = Value::Json(serde_json::json!({"a": 1, "b": [2, 3]}));
        assert_eq!(v.json_text().unwrap(), r#"{"a":1,"b":[2,3]}"#);
    }
}
