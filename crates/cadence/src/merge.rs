//! Configuration merge logic
//!
//! Builds the ordered [`WorkerSet`] for one system out of the configuration
//! document, in two phases:
//!
//! 1. Accumulate: walk the OS-scoped list, then the `all` list. A new name is
//!    appended; a repeated name keeps its position and has the incoming
//!    parameters merged over its existing ones (last write wins per key).
//! 2. Override: merge the override parameters over every worker, once.
//!
//! Overrides therefore win over any document value, whichever list the
//! worker came from and however often it appears.

use crate::error::{Error, Result};
use crate::types::{Parameters, RunArguments, WorkerSet};
use serde::Serialize;
use serde_json::Value;

/// Key of the list that applies to every system.
pub const ALL_KEY: &str = "all";

/// Caller-supplied parameters that take precedence over the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OverrideParameters(Parameters);

impl OverrideParameters {
    /// Build the overrides for a run.
    ///
    /// Named arguments come first, then free-form overrides, then the
    /// `extra_arguments` pairs; later sources win. Keys whose value is unset
    /// are dropped so the configuration default applies.
    ///
    /// ```
    /// use cadence::{OverrideParameters, RunArguments};
    /// use serde_json::json;
    ///
    /// let args = RunArguments::new().extra_arguments(["--foo-bar", "baz"]);
    /// let overrides = OverrideParameters::from_arguments(&args);
    /// assert_eq!(overrides.get("foo_bar"), Some(&json!("baz")));
    /// ```
    #[must_use]
    pub fn from_arguments(args: &RunArguments) -> Self {
        let mut merged: Vec<(String, Option<Value>)> = args
            .named_overrides()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        merged.extend(
            args.override_parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        for pair in args.extra_arguments.chunks(2) {
            match pair {
                [key, value] => {
                    merged.push((normalize_key(key), Some(Value::String(value.clone()))));
                }
                [key] => log::warn!("Ignoring extra argument without a value: {}", key),
                _ => {}
            }
        }

        // An unset value never clears one set by an earlier source.
        let mut params = Parameters::new();
        for (key, value) in merged {
            if let Some(value) = value {
                params.insert(key, value);
            }
        }
        Self(params)
    }

    /// Wrap an explicit parameter map.
    #[must_use]
    pub fn from_map(params: Parameters) -> Self {
        Self(params)
    }

    /// Look up an override.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The override map.
    #[must_use]
    pub fn as_map(&self) -> &Parameters {
        &self.0
    }

    /// Whether there are no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Strip leading hyphens and turn the remaining hyphens into underscores.
///
/// `--user-formulas` becomes `user_formulas`.
#[must_use]
pub fn normalize_key(flag: &str) -> String {
    flag.trim_start_matches('-').replace('-', "_")
}

/// Merge the document's OS-scoped and global workers into one ordered set.
///
/// # Errors
///
/// Returns `Error::MalformedConfiguration` if the document is not a mapping,
/// a worker list or entry has the wrong shape, or there are no workers for
/// this system at all.
pub fn merge(document: &str, os_key: &str, overrides: &OverrideParameters) -> Result<WorkerSet> {
    let Value::Object(doc) = parse_document(document)? else {
        return Err(Error::malformed("Must be a dictionary."));
    };

    let os_entries = worker_list(&doc, os_key)?;
    let all_entries = worker_list(&doc, ALL_KEY)?;

    if os_entries.is_empty() && all_entries.is_empty() {
        return Err(Error::malformed("No workers for this system."));
    }

    let mut workers = WorkerSet::new();
    for entry in os_entries.iter().chain(all_entries) {
        let (name, params) = worker_entry(entry)?;
        if workers.insert_or_update(name, params.clone()) {
            log::debug!("{} config: {}", name, Value::Object(params));
        } else {
            log::debug!("{} extra config: {}", name, Value::Object(params));
        }
    }

    workers.apply_overrides(overrides.as_map());
    log::debug!(
        "Command-line arguments merged into worker configs: {}",
        Value::Object(overrides.as_map().clone())
    );

    Ok(workers)
}

/// Parse YAML into JSON values, resolving `<<` merge keys first.
fn parse_document(document: &str) -> Result<Value> {
    let mut doc: serde_yaml::Value = serde_yaml::from_str(document)?;
    doc.apply_merge()?;
    serde_json::to_value(doc).map_err(|e| Error::malformed(e.to_string()))
}

/// The worker list under `key`; absent or null means empty.
fn worker_list<'a>(doc: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a [Value]> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(entries)) => Ok(entries),
        Some(other) => Err(Error::malformed(format!(
            "Workers for `{}` must be a list, found {}",
            key, other
        ))),
    }
}

/// Split a single-key `{name: params}` mapping.
fn worker_entry(entry: &Value) -> Result<(&str, Parameters)> {
    let failed = || Error::malformed(format!("Failed to merge worker config; worker={}", entry));

    let Value::Object(map) = entry else {
        return Err(failed());
    };
    if map.len() != 1 {
        return Err(failed());
    }
    let Some((name, params)) = map.iter().next() else {
        return Err(failed());
    };

    match params {
        Value::Null => Ok((name, Parameters::new())),
        Value::Object(params) => Ok((name, params.clone())),
        _ => Err(failed()),
    }
}
