//! OS-specific system parameters.
//!
//! Paths are built as strings with the *target* system's separator, so a
//! Windows layout resolves identically on any host.

use crate::platform::{Host, SystemKind};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Directory name used under the system root.
pub const TOOL_NAME: &str = "watchmaker";

/// Directory name used under the system drive on Windows.
pub const WINDOWS_TOOL_NAME: &str = "Watchmaker";

const UNIX_RESTART: &str = "shutdown -r +1 &";
const WINDOWS_RESTART_FLAGS: &str =
    r#"/r /t 30 /d p:2:4 /c "Watchmaker complete. Rebooting computer.""#;

/// Filesystem locations and commands for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemParams {
    /// Root of all files the run creates.
    pub prepdir: String,
    /// Scratch directory for workers; created before the cadence starts.
    pub workingdir: String,
    /// Directory for worker log files.
    pub logdir: String,
    /// Marker file workers may create when the system is ready.
    pub readyfile: String,
    /// Shell command that schedules a restart.
    pub restart: String,
    /// Path of `shutdown.exe` (Windows only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_path: Option<String>,
}

impl SystemParams {
    /// Resolve parameters for `kind`.
    ///
    /// `system_root` replaces the default root (`/` on Unix, `%SYSTEMDRIVE%`
    /// on Windows). A non-empty `log_dir` replaces the computed log directory.
    pub fn resolve(
        kind: SystemKind,
        host: &dyn Host,
        system_root: Option<&str>,
        log_dir: Option<&Path>,
    ) -> Self {
        let mut params = match kind {
            SystemKind::Unix => Self::unix(system_root.unwrap_or("/")),
            SystemKind::Windows => {
                let root = system_root
                    .map(str::to_string)
                    .or_else(|| host.var("SYSTEMDRIVE"))
                    .unwrap_or_else(|| "C:".to_string());
                let system_dir = host
                    .var("SYSTEMROOT")
                    .unwrap_or_else(|| join(kind, &root, &["Windows"]));
                Self::windows(&root, &system_dir)
            }
        };

        if let Some(dir) = log_dir.filter(|d| !d.as_os_str().is_empty()) {
            params.logdir = dir.display().to_string();
        }

        params
    }

    fn unix(root: &str) -> Self {
        let kind = SystemKind::Unix;
        let prepdir = join(kind, root, &["usr", "tmp", TOOL_NAME]);
        Self {
            readyfile: join(kind, root, &["var", "run", "system-is-ready"]),
            logdir: join(kind, root, &["var", "log"]),
            workingdir: join(kind, &prepdir, &["workingfiles"]),
            restart: UNIX_RESTART.to_string(),
            shutdown_path: None,
            prepdir,
        }
    }

    fn windows(drive: &str, system_dir: &str) -> Self {
        let kind = SystemKind::Windows;
        let prepdir = join(kind, drive, &[WINDOWS_TOOL_NAME]);
        let shutdown_path = join(kind, system_dir, &["system32", "shutdown.exe"]);
        Self {
            readyfile: join(kind, &prepdir, &["system-is-ready"]),
            logdir: join(kind, &prepdir, &["Logs"]),
            workingdir: join(kind, &prepdir, &["WorkingFiles"]),
            restart: format!("{} {}", shutdown_path, WINDOWS_RESTART_FLAGS),
            shutdown_path: Some(shutdown_path),
            prepdir,
        }
    }

    /// Flat key/value view, in a fixed key order.
    #[must_use]
    pub fn to_map(&self) -> IndexMap<&'static str, &str> {
        let mut map = IndexMap::new();
        map.insert("prepdir", self.prepdir.as_str());
        map.insert("readyfile", self.readyfile.as_str());
        map.insert("logdir", self.logdir.as_str());
        map.insert("workingdir", self.workingdir.as_str());
        if let Some(path) = &self.shutdown_path {
            map.insert("shutdown_path", path.as_str());
        }
        map.insert("restart", self.restart.as_str());
        map
    }
}

/// Join path components with the separator of `kind`.
fn join(kind: SystemKind, base: &str, parts: &[&str]) -> String {
    let sep = kind.separator();
    let mut path = base.to_string();
    for part in parts {
        if !path.ends_with(sep) {
            path.push(sep);
        }
        path.push_str(part);
    }
    path
}
