//! The universal entry value type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Result, StorageError};

/// A configuration entry value.
///
/// Serialized untagged, so a record persists as plain JSON. `null` is not a
/// valid top-level value; composite values may contain anything JSON allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryValue {
    /// `true` / `false`.
    Bool(bool),
    /// An integer or floating point number.
    Number(Number),
    /// A string. The only shape allowed in the `secret` scope.
    String(String),
    /// A JSON array.
    List(Vec<Value>),
    /// A JSON object.
    Map(Map<String, Value>),
}

impl EntryValue {
    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, if it is an integral number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns true for lists and maps.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Converts into a plain JSON value.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::String(s) => Value::String(s),
            Self::List(l) => Value::Array(l),
            Self::Map(m) => Value::Object(m),
        }
    }
}

impl TryFrom<Value> for EntryValue {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Err(StorageError::InvalidRecord {
                reason: "null is not a valid entry value".to_string(),
            }),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => Ok(Self::Number(n)),
            Value::String(s) => Ok(Self::String(s)),
            Value::Array(l) => Ok(Self::List(l)),
            Value::Object(m) => Ok(Self::Map(m)),
        }
    }
}

impl From<EntryValue> for Value {
    fn from(value: EntryValue) -> Self {
        value.into_json()
    }
}

impl From<String> for EntryValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for EntryValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for EntryValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for EntryValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for EntryValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for EntryValue {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl TryFrom<f64> for EntryValue {
    type Error = StorageError;

    fn try_from(f: f64) -> Result<Self> {
        Number::from_f64(f)
            .map(Self::Number)
            .ok_or_else(|| StorageError::InvalidRecord {
                reason: format!("{f} is not a finite number"),
            })
    }
}
