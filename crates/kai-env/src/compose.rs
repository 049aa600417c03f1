//! Environment composition.

use std::collections::{BTreeMap, HashMap};

use kai_storage::{EntryValue, Storage, GLOBAL_APP, VERSION_KEY};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::coerce::{value_to_env_string, CompositeMode};
use crate::error::Result;

/// Prefix of the supervisor's own configuration variables.
pub const RESERVED_PREFIX: &str = "KAIGARA_";

/// `KFILE_<NAME>_PATH` / `KFILE_<NAME>_CONTENT`, any case. `<NAME>` may be empty.
static KFILE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^KFILE_(.*)_(PATH|CONTENT)$").unwrap_or_else(|_| unreachable!())
});

/// A file to materialize before the child starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    /// Destination path, relative to the working directory unless absolute.
    pub path: String,
    /// File content.
    pub content: String,
}

/// The composed environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    /// `NAME=value` entries in composition order. Duplicates are kept; the
    /// last one wins when the OS resolves them.
    pub vars: Vec<String>,
    /// Logical file name (upper-cased) to file.
    pub files: HashMap<String, EnvFile>,
}

impl Env {
    /// Splits `vars` into (name, value) pairs. Entries without `=` get an
    /// empty value.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|v| v.split_once('=').unwrap_or((v.as_str(), "")))
    }

    /// Returns the effective (last) value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs()
            .filter(|(k, _)| *k == name)
            .map(|(_, v)| v)
            .last()
    }
}

/// Options for [`build_env`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Handling of list and map values.
    pub composite: CompositeMode,
}

/// Which part of a KFILE pair a key names.
enum KfilePart {
    Path,
    Content,
}

fn match_kfile(key: &str) -> Option<(String, KfilePart)> {
    let caps = KFILE_REGEX.captures(key)?;
    let name = caps.get(1)?.as_str().to_uppercase();
    let part = if caps.get(2)?.as_str().eq_ignore_ascii_case("PATH") {
        KfilePart::Path
    } else {
        KfilePart::Content
    };
    Some((name, part))
}

/// Builds the child environment.
///
/// 1. `current_env` is copied, minus entries starting with [`RESERVED_PREFIX`].
/// 2. For `global` then each of `app_names`, for each scope, the record is
///    read and its entries are exported in key order.
/// 3. `version` is never exported; KFILE keys become [`Env::files`] entries;
///    everything else is appended as `UPPER(key)=value`.
pub async fn build_env(
    app_names: &[String],
    storage: &dyn Storage,
    current_env: &[String],
    scopes: &[String],
    options: &BuildOptions,
) -> Result<Env> {
    let mut env = Env {
        vars: current_env
            .iter()
            .filter(|v| !v.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect(),
        files: HashMap::new(),
    };

    let apps = std::iter::once(GLOBAL_APP).chain(app_names.iter().map(String::as_str));

    for app in apps {
        for scope in scopes {
            storage.read(app, scope).await?;
            let entries = storage.get_entries(app, scope).await?;
            debug!(app, scope = %scope, count = entries.len(), "composing entries");

            for (key, value) in &entries {
                if key.eq_ignore_ascii_case(VERSION_KEY) {
                    continue;
                }

                let Some(val) = value_to_env_string(key, value, options.composite)? else {
                    trace!(key = %key, "skipping composite value");
                    continue;
                };

                match match_kfile(key) {
                    Some((name, part)) => {
                        let file = env.files.entry(name).or_default();
                        match part {
                            KfilePart::Path => file.path = val,
                            KfilePart::Content => file.content = val,
                        }
                    }
                    None => env.vars.push(format!("{}={val}", key.to_uppercase())),
                }
            }
        }
    }

    Ok(env)
}

/// Merges the entries of `app_names` over `scopes` into one view keyed by
/// upper-cased name. Later apps and scopes override earlier ones.
pub async fn collect_entries(
    app_names: &[String],
    scopes: &[String],
    storage: &dyn Storage,
) -> Result<BTreeMap<String, EntryValue>> {
    let mut merged = BTreeMap::new();

    for app in app_names {
        for scope in scopes {
            storage.read(app, scope).await?;
            for (key, value) in storage.get_entries(app, scope).await? {
                if key.eq_ignore_ascii_case(VERSION_KEY) {
                    continue;
                }
                merged.insert(key.to_uppercase(), value);
            }
        }
    }

    Ok(merged)
}
