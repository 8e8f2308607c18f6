//! Dynamic value type for node inputs, outputs, and carried state.
//!
//! Provides a flexible value type for field access, comparison, and
//! convergence-expression evaluation over node output namespaces.

use crate::error::{GyreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Dynamic value flowing between nodes.
///
/// Wraps `serde_json::Value` to provide type-safe field extraction and
/// comparison operations used by the parameter resolver and the
/// convergence evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub JsonValue);

impl Value {
    /// Create a null value.
    pub fn null() -> Self {
        Self(JsonValue::Null)
    }

    /// Create an empty object value.
    ///
    /// This is the canonical "no state yet" value: state snapshots start
    /// as empty objects, never null.
    pub fn object() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Create a boolean value.
    pub fn bool(v: bool) -> Self {
        Self(JsonValue::Bool(v))
    }

    /// Create an integer value.
    pub fn int(v: i64) -> Self {
        Self(JsonValue::Number(v.into()))
    }

    /// Create a floating-point value.
    pub fn float(v: f64) -> Self {
        Self(serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number))
    }

    /// Create a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Self(JsonValue::String(v.into()))
    }

    /// Serialize any serde-compatible value.
    pub fn from_serialize<T: Serialize>(v: &T) -> Result<Self> {
        serde_json::to_value(v)
            .map(Self)
            .map_err(|e| GyreError::Serialization(format!("failed to serialize value: {}", e)))
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Check if the value is an object.
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// Set a top-level field, converting the value to an object if needed.
    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        if !self.0.is_object() {
            self.0 = JsonValue::Object(serde_json::Map::new());
        }
        if let JsonValue::Object(map) = &mut self.0 {
            map.insert(key.into(), value.0);
        }
    }

    /// Get a field by path (dot notation, with optional array indices).
    ///
    /// Supports:
    /// - Simple field access: "field"
    /// - Dot notation: "parent.child.value"
    /// - Array index notation: "items[0].name"
    ///
    /// Returns None if the field doesn't exist.
    pub fn get_field(&self, path: &str) -> Option<Value> {
        let mut current = &self.0;
        for part in path.split('.') {
            if let Some((field, idx_str)) = part.split_once('[') {
                current = current.get(field)?;
                let idx_str = idx_str.strip_suffix(']')?;
                let idx: usize = idx_str.parse().ok()?;
                current = current.get(idx)?;
            } else {
                current = current.get(part)?;
            }
        }
        Some(Value(current.clone()))
    }

    /// Get a field as a string.
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get_field(path).and_then(|v| v.as_string())
    }

    /// Get a field as an f64.
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get_field(path).and_then(|v| v.as_f64())
    }

    /// Get a field as a bool.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get_field(path).and_then(|v| v.as_bool())
    }

    /// Convert to string if possible.
    pub fn as_string(&self) -> Option<String> {
        match &self.0 {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            JsonValue::Null => None,
            _ => Some(self.0.to_string()),
        }
    }

    /// Convert to f64 if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.0 {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to bool if possible.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.0 {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            JsonValue::Number(n) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
            JsonValue::Null => Some(false),
            _ => None,
        }
    }

    /// Check if a boolean field is true.
    pub fn field_is_true(&self, path: &str) -> bool {
        self.get_bool(path).unwrap_or(false)
    }

    /// Access the inner serde_json::Value.
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert into the inner serde_json::Value.
    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Self(v)
    }
}

impl From<Value> for JsonValue {
    fn from(v: Value) -> Self {
        v.0
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::bool(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self(JsonValue::Array(
            v.into_iter().map(|item| item.into().0).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_nested_field_access() {
        let value = Value(json!({
            "result": {
                "status": "success",
                "data": {
                    "count": 42
                }
            }
        }));

        assert_eq!(
            value.get_string("result.status"),
            Some("success".to_string())
        );
        assert_eq!(value.get_f64("result.data.count"), Some(42.0));
    }

    #[test]
    fn value_array_access() {
        let value = Value(json!({
            "items": [
                {"name": "first"},
                {"name": "second"}
            ]
        }));

        assert_eq!(value.get_string("items[0].name"), Some("first".to_string()));
        assert_eq!(
            value.get_string("items[1].name"),
            Some("second".to_string())
        );
    }

    #[test]
    fn empty_object_is_not_null() {
        let value = Value::object();
        assert!(!value.is_null());
        assert!(value.is_object());
    }

    #[test]
    fn set_field_builds_object() {
        let mut value = Value::null();
        value.set_field("average", Value::float(95.5));
        assert_eq!(value.get_f64("average"), Some(95.5));
    }

    #[test]
    fn bool_coercion() {
        assert_eq!(Value::string("true").as_bool(), Some(true));
        assert_eq!(Value::int(0).as_bool(), Some(false));
        assert_eq!(Value::null().as_bool(), Some(false));
    }

    #[test]
    fn field_bool_checks() {
        let value = Value(json!({"needs_adjustment": true}));
        assert!(value.field_is_true("needs_adjustment"));
        assert!(!value.field_is_true("missing"));
    }

    #[test]
    fn missing_field_returns_none() {
        let value = Value(json!({"a": 1}));
        assert!(value.get_field("missing").is_none());
        assert!(value.get_f64("missing").is_none());
    }

    #[test]
    fn vec_conversion() {
        let value: Value = vec![110.0, 120.0, 130.0].into();
        assert_eq!(value.get_f64("[0]"), None); // bare index is not a path
        assert_eq!(value.0[0], json!(110.0));
    }
}
