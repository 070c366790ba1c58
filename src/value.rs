//! The document model written to the store, and the coercion rules from formatter output into it.

use std::time::SystemTime;

use serde::{ser::SerializeMap, ser::SerializeSeq, Serialize, Serializer};
use thiserror::Error;

/// A value that the document store can hold natively.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Timestamp(bson::DateTime),
    Document(LogDocument),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int32(i) => serializer.serialize_i32(*i),
            Value::Int64(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => ts.serialize(serializer),
            Value::Document(doc) => doc.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<SystemTime> for Value {
    fn from(value: SystemTime) -> Self {
        Value::Timestamp(bson::DateTime::from_system_time(value))
    }
}

impl From<LogDocument> for Value {
    fn from(value: LogDocument) -> Self {
        Value::Document(value)
    }
}

/// An ordered document. Keys keep insertion order and are never deduplicated: pushing the same key twice
/// yields two entries, which is also how the document is serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogDocument {
    entries: Vec<(String, Value)>,
}

impl LogDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for LogDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("unsigned integer {0} does not fit in a signed 64-bit value")]
    IntegerOverflow(u64),

    #[error("non-finite number {0} has no storable representation")]
    NonFinite(f64),
}

/// The output of a formatter. Either already a native [Value], or raw data that gets coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    Value(Value),
    Text(String),
    Json(serde_json::Value),
    Unsigned(u64),
    Float(f64),
    Time(SystemTime),
}

impl Formatted {
    /// Converts into the nearest native value.
    ///
    /// Text stays text; JSON numbers become 64-bit integers when integral and doubles otherwise; objects become
    /// nested documents in their key order.
    pub fn coerce(self) -> Result<Value, CoercionError> {
        match self {
            Formatted::Value(value) => Ok(value),
            Formatted::Text(text) => Ok(Value::String(text)),
            Formatted::Json(json) => coerce_json(json),
            Formatted::Unsigned(n) => i64::try_from(n)
                .map(Value::Int64)
                .map_err(|_| CoercionError::IntegerOverflow(n)),
            Formatted::Float(f) if f.is_finite() => Ok(Value::Double(f)),
            Formatted::Float(f) => Err(CoercionError::NonFinite(f)),
            Formatted::Time(time) => Ok(time.into()),
        }
    }
}

fn coerce_json(json: serde_json::Value) -> Result<Value, CoercionError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int64(i)
            } else if let Some(u) = n.as_u64() {
                return Err(CoercionError::IntegerOverflow(u));
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => Value::Double(f),
                    Some(f) => return Err(CoercionError::NonFinite(f)),
                    None => Value::Null,
                }
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(coerce_json)
                .collect::<Result<_, _>>()?,
        ),
        serde_json::Value::Object(map) => {
            let mut doc = LogDocument::with_capacity(map.len());
            for (key, value) in map {
                doc.push(key, coerce_json(value)?);
            }
            Value::Document(doc)
        }
    })
}

impl From<&str> for Formatted {
    fn from(value: &str) -> Self {
        Formatted::Text(value.to_string())
    }
}

impl From<String> for Formatted {
    fn from(value: String) -> Self {
        Formatted::Text(value)
    }
}

impl From<Value> for Formatted {
    fn from(value: Value) -> Self {
        Formatted::Value(value)
    }
}

impl From<serde_json::Value> for Formatted {
    fn from(value: serde_json::Value) -> Self {
        Formatted::Json(value)
    }
}
