//! Core types for provisioning runs.
//!
//! This module contains the run arguments accepted by the [`Client`](crate::Client),
//! the worker entries produced by the merge, and the run outcome.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Worker parameters, in document order.
pub type Parameters = serde_json::Map<String, Value>;

/// Log verbosity accepted on the command line and in [`RunArguments`].
///
/// Parsing is case-insensitive.
///
/// ```
/// use cadence::LogLevel;
///
/// let level: LogLevel = "WARNING".parse().unwrap();
/// assert_eq!(level, LogLevel::Warning);
/// assert_eq!(level.to_level_filter(), log::LevelFilter::Warn);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only unrecoverable failures.
    Critical,
    /// Errors.
    Error,
    /// Warnings and errors.
    Warning,
    /// Progress messages.
    #[default]
    Info,
    /// Everything, including merged worker configuration.
    Debug,
}

impl LogLevel {
    /// All levels, from least to most verbose.
    #[must_use]
    pub fn all() -> &'static [LogLevel] {
        &[
            Self::Critical,
            Self::Error,
            Self::Warning,
            Self::Info,
            Self::Debug,
        ]
    }

    /// Lowercase name of the level.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Map onto the `log` crate's filter.
    ///
    /// `log` has no level above error, so `critical` and `error` coincide.
    #[must_use]
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Critical | Self::Error => log::LevelFilter::Error,
            Self::Warning => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|level| level.name() == lowered)
            .ok_or_else(|| {
                let valid: Vec<_> = Self::all().iter().map(LogLevel::name).collect();
                format!("invalid log level '{}', expected one of: {}", s, valid.join(", "))
            })
    }
}

/// Options for a provisioning run.
///
/// For every named override (`admin_groups`, `salt_states`, ...), `None`
/// means "use the value from the configuration file". The string `"None"`
/// is a real value and is passed to the workers.
///
/// ```
/// use cadence::RunArguments;
///
/// let args = RunArguments::new()
///     .config_source("https://example.com/config.yaml")
///     .no_reboot(true)
///     .environment("dev")
///     .extra_arguments(["--user-formulas", "{}"]);
///
/// assert!(args.no_reboot);
/// assert_eq!(args.environment.as_deref(), Some("dev"));
/// assert_eq!(args.extra_arguments.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunArguments {
    /// Path or URL of the configuration (None = bundled default).
    pub config_source: Option<String>,
    /// Directory for log files; also overrides the system log directory.
    pub log_dir: Option<PathBuf>,
    /// Suppress the reboot after a successful run.
    pub no_reboot: bool,
    /// Log verbosity.
    pub log_level: Option<LogLevel>,
    /// Colon-separated domain groups to grant admin rights.
    pub admin_groups: Option<String>,
    /// Colon-separated domain users to grant admin rights.
    pub admin_users: Option<String>,
    /// Computer name to apply to the system.
    pub computer_name: Option<String>,
    /// Environment the system is built for (dev, test, prod).
    pub environment: Option<String>,
    /// Comma-separated states to apply.
    pub salt_states: Option<String>,
    /// Retrieve content with S3 utilities instead of HTTP.
    pub s3_source: Option<bool>,
    /// Full DN of the OU for the computer account.
    pub ou_path: Option<String>,
    /// Free-form overrides merged into every worker.
    pub override_parameters: IndexMap<String, Option<Value>>,
    /// Flat `--flag value` pairs merged into every worker.
    pub extra_arguments: Vec<String>,
}

impl RunArguments {
    /// Create run arguments with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration path or URL.
    #[must_use]
    pub fn config_source(mut self, source: impl Into<String>) -> Self {
        self.config_source = Some(source.into());
        self
    }

    /// Set the log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Set whether to suppress the reboot.
    #[must_use]
    pub fn no_reboot(mut self, no_reboot: bool) -> Self {
        self.no_reboot = no_reboot;
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the admin groups override.
    #[must_use]
    pub fn admin_groups(mut self, groups: impl Into<String>) -> Self {
        self.admin_groups = Some(groups.into());
        self
    }

    /// Set the admin users override.
    #[must_use]
    pub fn admin_users(mut self, users: impl Into<String>) -> Self {
        self.admin_users = Some(users.into());
        self
    }

    /// Set the computer name override.
    #[must_use]
    pub fn computer_name(mut self, name: impl Into<String>) -> Self {
        self.computer_name = Some(name.into());
        self
    }

    /// Set the environment override.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the salt states override.
    #[must_use]
    pub fn salt_states(mut self, states: impl Into<String>) -> Self {
        self.salt_states = Some(states.into());
        self
    }

    /// Set the S3 source override.
    #[must_use]
    pub fn s3_source(mut self, s3_source: bool) -> Self {
        self.s3_source = Some(s3_source);
        self
    }

    /// Set the OU path override.
    #[must_use]
    pub fn ou_path(mut self, ou_path: impl Into<String>) -> Self {
        self.ou_path = Some(ou_path.into());
        self
    }

    /// Add a free-form override. `None` leaves the configuration value alone.
    #[must_use]
    pub fn override_parameter(mut self, key: impl Into<String>, value: Option<Value>) -> Self {
        self.override_parameters.insert(key.into(), value);
        self
    }

    /// Set the flat list of extra `--flag value` pairs.
    #[must_use]
    pub fn extra_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_arguments = args.into_iter().map(Into::into).collect();
        self
    }

    /// The named overrides, in a fixed order.
    pub(crate) fn named_overrides(&self) -> [(&'static str, Option<Value>); 7] {
        let text = |v: &Option<String>| v.clone().map(Value::String);
        [
            ("admin_groups", text(&self.admin_groups)),
            ("admin_users", text(&self.admin_users)),
            ("computer_name", text(&self.computer_name)),
            ("environment", text(&self.environment)),
            ("salt_states", text(&self.salt_states)),
            ("s3_source", self.s3_source.map(Value::Bool)),
            ("ou_path", text(&self.ou_path)),
        ]
    }
}

/// One named unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerEntry {
    /// Unique, case-sensitive worker name.
    pub name: String,
    /// Parameters handed to the worker implementation.
    pub parameters: Parameters,
}

impl WorkerEntry {
    /// Create a worker entry.
    pub fn new(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// Ordered set of workers, keyed by name.
///
/// Iteration order is first-seen order across the OS-scoped list and then
/// the global list; backends execute workers in exactly this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkerSet {
    entries: IndexMap<String, WorkerEntry>,
}

impl WorkerSet {
    /// Create an empty worker set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new worker, or shallow-merge `parameters` over an existing one.
    ///
    /// Returns `true` if the worker was new. Existing workers keep their position.
    pub fn insert_or_update(&mut self, name: &str, parameters: Parameters) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.parameters.extend(parameters);
                false
            }
            None => {
                self.entries
                    .insert(name.to_string(), WorkerEntry::new(name, parameters));
                true
            }
        }
    }

    /// Shallow-merge `overrides` over the parameters of every worker.
    pub fn apply_overrides(&mut self, overrides: &Parameters) {
        for entry in self.entries.values_mut() {
            entry
                .parameters
                .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    /// Look up a worker by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&WorkerEntry> {
        self.entries.get(name)
    }

    /// Worker names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Workers in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerEntry> {
        self.entries.values()
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a WorkerSet {
    type Item = &'a WorkerEntry;
    type IntoIter = indexmap::map::Values<'a, String, WorkerEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// Terminal state of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All workers ran; reboot was suppressed.
    Succeeded,
    /// All workers ran and the restart command was issued.
    RebootTriggered,
}

impl Outcome {
    /// Whether a restart was requested.
    #[must_use]
    pub fn rebooted(&self) -> bool {
        matches!(self, Self::RebootTriggered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    // =========================================================================
    // LogLevel tests
    // =========================================================================

    #[test]
    fn test_log_level_parse_case_insensitive() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_parse_invalid() {
        let err = "verbose".parse::<LogLevel>().unwrap_err();
        assert!(err.contains("verbose"));
        assert!(err.contains("critical"));
    }

    #[test]
    fn test_log_level_filters() {
        assert_eq!(LogLevel::Critical.to_level_filter(), log::LevelFilter::Error);
        assert_eq!(LogLevel::Error.to_level_filter(), log::LevelFilter::Error);
        assert_eq!(LogLevel::Debug.to_level_filter(), log::LevelFilter::Debug);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    // =========================================================================
    // RunArguments tests
    // =========================================================================

    #[test]
    fn test_run_arguments_default() {
        let args = RunArguments::default();
        assert!(args.config_source.is_none());
        assert!(args.log_dir.is_none());
        assert!(!args.no_reboot);
        assert!(args.extra_arguments.is_empty());
        assert!(args.named_overrides().iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn test_run_arguments_named_overrides() {
        let args = RunArguments::new()
            .admin_groups("group1:group2")
            .s3_source(true)
            .ou_path("OU=Apps,DC=example,DC=com");

        let named = args.named_overrides();
        assert_eq!(named[0], ("admin_groups", Some(json!("group1:group2"))));
        assert_eq!(named[5], ("s3_source", Some(json!(true))));
        assert_eq!(named[6], ("ou_path", Some(json!("OU=Apps,DC=example,DC=com"))));
        assert_eq!(named[1], ("admin_users", None));
    }

    // =========================================================================
    // WorkerSet tests
    // =========================================================================

    #[test]
    fn test_worker_set_keeps_first_seen_position() {
        let mut set = WorkerSet::new();
        assert!(set.insert_or_update("a", params(json!({"x": 1}))));
        assert!(set.insert_or_update("b", Parameters::new()));
        assert!(!set.insert_or_update("a", params(json!({"y": 2}))));

        assert_eq!(set.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(set.get("a").unwrap().parameters, params(json!({"x": 1, "y": 2})));
    }

    #[test]
    fn test_worker_set_update_overwrites_keys() {
        let mut set = WorkerSet::new();
        set.insert_or_update("a", params(json!({"x": 1})));
        set.insert_or_update("a", params(json!({"x": 2})));
        assert_eq!(set.get("a").unwrap().parameters["x"], json!(2));
    }

    #[test]
    fn test_worker_set_names_are_case_sensitive() {
        let mut set = WorkerSet::new();
        set.insert_or_update("Salt", Parameters::new());
        set.insert_or_update("salt", Parameters::new());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_worker_set_apply_overrides() {
        let mut set = WorkerSet::new();
        set.insert_or_update("a", params(json!({"env": "prod", "x": 1})));
        set.insert_or_update("b", Parameters::new());
        set.apply_overrides(&params(json!({"env": "dev"})));

        assert_eq!(set.get("a").unwrap().parameters, params(json!({"env": "dev", "x": 1})));
        assert_eq!(set.get("b").unwrap().parameters, params(json!({"env": "dev"})));
    }

    #[test]
    fn test_outcome_rebooted() {
        assert!(Outcome::RebootTriggered.rebooted());
        assert!(!Outcome::Succeeded.rebooted());
    }
}
