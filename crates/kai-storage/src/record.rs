//! The persisted unit: one (app, scope) record.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Result, StorageError};
use crate::value::EntryValue;

/// Reserved entry name holding the record version.
pub const VERSION_KEY: &str = "version";

/// Entries of one (app, scope) pair plus its version.
///
/// `entries` never contains [`VERSION_KEY`]; the version lives in its own
/// field and is merged back only when the record is turned into a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Entry name to value. Secret-scope values are ciphertext here.
    pub entries: BTreeMap<String, EntryValue>,
    /// Record version, starting at 0.
    pub version: i64,
}

impl Record {
    /// Creates an empty record at `version`.
    #[must_use]
    pub fn with_version(version: i64) -> Self {
        Self {
            entries: BTreeMap::new(),
            version,
        }
    }

    /// Renders the record as a JSON object: every entry plus `"version"`.
    #[must_use]
    pub fn to_document(&self) -> Map<String, Value> {
        let mut doc: Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().into_json()))
            .collect();
        doc.insert(VERSION_KEY.to_string(), Value::from(self.version));
        doc
    }

    /// Parses a record document.
    ///
    /// A missing `"version"` reads as 0. Integral numbers and decimal strings
    /// are both accepted for it.
    pub fn from_document(doc: Map<String, Value>) -> Result<Self> {
        let mut record = Self::default();

        for (key, value) in doc {
            if key == VERSION_KEY {
                record.version = parse_version(&value)?;
                continue;
            }
            let entry = EntryValue::try_from(value).map_err(|_| StorageError::InvalidRecord {
                reason: format!("entry {key} is null"),
            })?;
            record.entries.insert(key, entry);
        }

        Ok(record)
    }

    /// Parses a record from a JSON value that must be an object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(doc) => Self::from_document(doc),
            other => Err(StorageError::InvalidRecord {
                reason: format!("expected an object, got {other}"),
            }),
        }
    }
}

/// Reads a version stored either as a JSON integer or a decimal string.
pub fn parse_version(value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| StorageError::InvalidRecord {
        reason: format!("version {value} is not an integer"),
    })
}
