//! Process execution backend.
//!
//! Each worker is an executable named `watchmaker-<worker>` found on `PATH`.
//! It receives its parameters as a JSON object on stdin and the system
//! parameters as `WATCHMAKER_<KEY>` environment variables.

use cadence::{ExecutionBackend, SystemKind, SystemParams, WorkerEntry, WorkerFailure, WorkerSet};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Prefix of worker executable names.
pub const WORKER_PREFIX: &str = "watchmaker-";

/// Runs workers as child processes.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    kind: SystemKind,
    search_path: Option<OsString>,
}

impl ProcessBackend {
    pub fn new(kind: SystemKind) -> Self {
        Self {
            kind,
            search_path: None,
        }
    }

    /// Look for workers in `path` instead of `PATH`.
    #[cfg(test)]
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    fn locate(&self, worker: &str) -> Result<PathBuf, WorkerFailure> {
        let binary = format!("{WORKER_PREFIX}{worker}");
        let found = match &self.search_path {
            Some(path) => {
                let cwd = std::env::current_dir()
                    .map_err(|e| WorkerFailure::new(worker, e.to_string()))?;
                which::which_in(&binary, Some(path), cwd)
            }
            None => which::which(&binary),
        };
        found.map_err(|_| WorkerFailure::new(worker, format!("`{binary}` not found on PATH")))
    }

    fn run_worker(&self, params: &SystemParams, worker: &WorkerEntry) -> Result<(), WorkerFailure> {
        let fail = |message: String| WorkerFailure::new(&worker.name, message);

        let program = self.locate(&worker.name)?;
        let input = serde_json::to_vec(&worker.parameters).map_err(|e| fail(e.to_string()))?;
        log::info!("Executing worker {} ({})", worker.name, program.display());
        log::debug!("{} system: {}", worker.name, self.kind);

        let mut command = Command::new(&program);
        command
            .current_dir(&params.workingdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        for (key, value) in params.to_map() {
            command.env(format!("WATCHMAKER_{}", key.to_ascii_uppercase()), value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| fail(format!("failed to start {}: {e}", program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&input) {
                Ok(()) => {}
                // The worker may exit without reading its parameters.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    terminate(&mut child);
                    return Err(fail(e.to_string()));
                }
            }
        }

        let status = child.wait().map_err(|e| fail(e.to_string()))?;
        if status.success() {
            log::info!("Worker {} completed", worker.name);
            Ok(())
        } else {
            Err(fail(format!("exited with {status}")))
        }
    }
}

/// Kill `child` and reap it.
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill worker process {}: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        log::warn!("Failed to reap worker process {}: {}", child.id(), e);
    }
}

impl ExecutionBackend for ProcessBackend {
    fn run_cadence(
        &self,
        params: &SystemParams,
        workers: &WorkerSet,
    ) -> Result<(), WorkerFailure> {
        workers
            .iter()
            .try_for_each(|worker| self.run_worker(params, worker))
    }
}
