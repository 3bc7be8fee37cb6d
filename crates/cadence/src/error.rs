//! Error types for provisioning runs.
//!
//! Every failure in a run is fatal: there is no local recovery and no
//! partial-success reporting. Errors are grouped into categories so the
//! caller can pick an exit code and a piece of advice for the operator.

use crate::backend::WorkerFailure;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for cadence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad categories of run failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The configuration could not be fetched or understood.
    Configuration,
    /// The running system is not supported.
    Platform,
    /// A filesystem operation failed.
    Filesystem,
    /// A worker or the restart command failed.
    Execution,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Platform => "Unsupported system",
            Self::Filesystem => "Filesystem error",
            Self::Execution => "Execution failure",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => {
                "Double-check the config path or URL, or run without --config to use the default"
            }
            Self::Platform => "Only Linux and Windows systems can be provisioned",
            Self::Filesystem => "Check permissions on the system root directories",
            Self::Execution => "Inspect the worker output above; the system was not rebooted",
        }
    }

    /// Process exit code associated with this category.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::Platform => 3,
            Self::Filesystem => 4,
            Self::Execution => 1,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while resolving or running a cadence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration source could not be fetched or does not exist.
    #[error("configuration unreachable at {location}: {message}")]
    ConfigurationUnreachable {
        /// Path or URL that was requested.
        location: String,
        /// Why it could not be read.
        message: String,
    },

    /// The configuration document is structurally invalid or empty.
    #[error("malformed config file: {0}")]
    MalformedConfiguration(String),

    /// The running OS is neither Unix-like nor Windows-like.
    #[error("system, {system}, is not recognized")]
    UnsupportedSystem {
        /// The OS identifier that was detected.
        system: String,
    },

    /// The working directory could not be created.
    #[error("unable to create directory {}: {source}", path.display())]
    DirectoryPreparationFailed {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The execution backend reported a worker failure.
    #[error("execution of the workers cadence has failed: {0}")]
    CadenceFailed(#[from] WorkerFailure),

    /// The restart command could not be started.
    #[error("failed to schedule restart `{command}`: {source}")]
    RestartFailed {
        /// The restart command line.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create a `ConfigurationUnreachable` error.
    pub fn unreachable(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationUnreachable {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a `MalformedConfiguration` error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedConfiguration(message.into())
    }

    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigurationUnreachable { .. } | Self::MalformedConfiguration(_) => {
                ErrorCategory::Configuration
            }
            Self::UnsupportedSystem { .. } => ErrorCategory::Platform,
            Self::DirectoryPreparationFailed { .. } => ErrorCategory::Filesystem,
            Self::CadenceFailed(_) | Self::RestartFailed { .. } => ErrorCategory::Execution,
        }
    }

    /// Get the name of the failed worker, if this is a cadence failure.
    #[must_use]
    pub fn failed_worker(&self) -> Option<&str> {
        match self {
            Self::CadenceFailed(failure) => Some(&failure.worker),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::MalformedConfiguration(err.to_string())
    }
}
