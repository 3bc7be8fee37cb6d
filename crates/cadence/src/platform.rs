//! Platform detection.
//!
//! The running system is classified once per run into a [`SystemKind`].
//! Detection goes through the [`Host`] trait so that Windows parameters can
//! be resolved (and tested) on a Linux machine and vice versa.
//!
//! ```
//! use cadence::platform::{Host, StaticHost, SystemKind};
//!
//! let host = StaticHost::new("Windows").with_var("SYSTEMDRIVE", "D:");
//! let kind = SystemKind::detect(&host.os()).unwrap();
//! assert_eq!(kind, SystemKind::Windows);
//! assert_eq!(kind.config_key(), "windows");
//! ```

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Family of operating system being provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemKind {
    /// Linux and friends.
    Unix,
    /// Microsoft Windows.
    Windows,
}

impl SystemKind {
    /// Classify an OS identifier such as `linux` or `Windows`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedSystem` for anything else.
    pub fn detect(os: &str) -> Result<Self> {
        let system = os.to_ascii_lowercase();
        if system.contains("linux") {
            Ok(Self::Unix)
        } else if system.contains("windows") {
            Ok(Self::Windows)
        } else {
            Err(Error::UnsupportedSystem { system })
        }
    }

    /// Top-level key of the configuration document for this system.
    #[must_use]
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Unix => "linux",
            Self::Windows => "windows",
        }
    }

    /// Path separator of the target system.
    #[must_use]
    pub fn separator(&self) -> char {
        match self {
            Self::Unix => '/',
            Self::Windows => '\\',
        }
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_key())
    }
}

/// Access to the machine the run executes on.
pub trait Host: Send + Sync {
    /// OS identifier, e.g. `linux` or `windows`.
    fn os(&self) -> String;

    /// Read an environment variable.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentHost;

impl Host for CurrentHost {
    fn os(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed host for tests and for resolving another system's parameters.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    os: String,
    vars: HashMap<String, String>,
}

impl StaticHost {
    /// Create a host reporting the given OS identifier.
    pub fn new(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            vars: HashMap::new(),
        }
    }

    /// Set an environment variable.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Host for StaticHost {
    fn os(&self) -> String {
        self.os.clone()
    }

    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_linux() {
        assert_eq!(SystemKind::detect("linux").unwrap(), SystemKind::Unix);
        assert_eq!(SystemKind::detect("Linux").unwrap(), SystemKind::Unix);
    }

    #[test]
    fn test_detect_windows() {
        assert_eq!(SystemKind::detect("windows").unwrap(), SystemKind::Windows);
        assert_eq!(SystemKind::detect("Windows").unwrap(), SystemKind::Windows);
    }

    #[test]
    fn test_detect_unsupported() {
        let err = SystemKind::detect("Darwin").unwrap_err();
        match err {
            Error::UnsupportedSystem { system } => assert_eq!(system, "darwin"),
            other => panic!("Expected Error::UnsupportedSystem, got {other:?}"),
        }
        assert!(SystemKind::detect("").is_err());
    }

    #[test]
    fn test_config_keys() {
        assert_eq!(SystemKind::Unix.config_key(), "linux");
        assert_eq!(SystemKind::Windows.config_key(), "windows");
        assert_eq!(SystemKind::Unix.to_string(), "linux");
    }

    #[test]
    fn test_static_host() {
        let host = StaticHost::new("windows").with_var("SYSTEMDRIVE", "C:");
        assert_eq!(host.os(), "windows");
        assert_eq!(host.var("SYSTEMDRIVE").as_deref(), Some("C:"));
        assert!(host.var("SYSTEMROOT").is_none());
    }

    #[test]
    fn test_current_host_os() {
        let os = CurrentHost.os();
        assert_eq!(os, std::env::consts::OS);
    }
}
