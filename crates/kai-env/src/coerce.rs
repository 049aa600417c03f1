//! Entry value to environment string coercion.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use kai_storage::EntryValue;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::{EnvError, Result};

/// What to do with list and map values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeMode {
    /// Leave them out of the environment.
    #[default]
    Skip,
    /// Export them as base64 (standard alphabet) of their JSON encoding.
    Base64Json,
}

impl FromStr for CompositeMode {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "base64-json" | "base64json" => Ok(Self::Base64Json),
            other => Err(EnvError::UnknownCompositeMode(other.to_string())),
        }
    }
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Base64Json => "base64-json",
        })
    }
}

/// Renders a number as a plain decimal: no exponent, minimal digits.
fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    // f64's Display never uses exponent notation and prints the shortest
    // digits that round-trip.
    n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string())
}

/// Converts an entry value to its environment form.
///
/// Returns `Ok(None)` for composite values in [`CompositeMode::Skip`].
///
/// - bool: `true` / `false`
/// - number: plain decimal
/// - string: itself
/// - list / map: skipped, or base64 of the JSON encoding
pub fn value_to_env_string(
    key: &str,
    value: &EntryValue,
    mode: CompositeMode,
) -> Result<Option<String>> {
    match value {
        EntryValue::Bool(b) => Ok(Some(b.to_string())),
        EntryValue::Number(n) => Ok(Some(number_to_string(n))),
        EntryValue::String(s) => Ok(Some(s.clone())),
        EntryValue::List(_) | EntryValue::Map(_) => match mode {
            CompositeMode::Skip => Ok(None),
            CompositeMode::Base64Json => {
                let raw = serde_json::to_vec(value).map_err(|e| EnvError::Composite {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(STANDARD.encode(raw)))
            }
        },
    }
}
