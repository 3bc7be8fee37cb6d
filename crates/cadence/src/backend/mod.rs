//! Execution backends.
//!
//! A backend runs every worker of a [`WorkerSet`] in order and stops at the
//! first failure. The crate does not know what a worker does; concrete
//! backends live with the application.
//!
//! # Testing
//!
//! Use [`MockBackend`] to record a cadence without running anything:
//!
//! ```
//! use cadence::backend::{ExecutionBackend, MockBackend};
//! use cadence::platform::{StaticHost, SystemKind};
//! use cadence::{SystemParams, WorkerSet};
//!
//! let mut workers = WorkerSet::new();
//! workers.insert_or_update("yum", Default::default());
//! workers.insert_or_update("salt", Default::default());
//!
//! let params = SystemParams::resolve(SystemKind::Unix, &StaticHost::new("linux"), None, None);
//! let backend = MockBackend::new().fail_on("salt");
//!
//! let failure = backend.run_cadence(&params, &workers).unwrap_err();
//! assert_eq!(failure.worker, "salt");
//! assert_eq!(backend.executed(), ["yum", "salt"]);
//! ```

use crate::params::SystemParams;
use crate::platform::SystemKind;
use crate::types::{Parameters, WorkerSet};
use std::sync::{Arc, Mutex};

/// A worker failed; the cadence stopped there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("worker `{worker}` failed: {message}")]
pub struct WorkerFailure {
    /// Name of the worker that failed.
    pub worker: String,
    /// What went wrong, as reported by the worker.
    pub message: String,
}

impl WorkerFailure {
    /// Create a worker failure.
    pub fn new(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            message: message.into(),
        }
    }
}

/// Runs the configured workers.
pub trait ExecutionBackend {
    /// Execute every worker in `workers`, in order.
    ///
    /// Each worker receives its own `parameters`. Execution stops at the
    /// first failing worker; workers after it are not started and workers
    /// before it are not rolled back. No retries.
    ///
    /// # Errors
    ///
    /// Returns the [`WorkerFailure`] of the first worker that failed.
    fn run_cadence(
        &self,
        params: &SystemParams,
        workers: &WorkerSet,
    ) -> Result<(), WorkerFailure>;
}

/// Chooses a backend for the detected system.
pub type BackendFactory<'a> = &'a dyn Fn(SystemKind) -> Box<dyn ExecutionBackend>;

/// Backend that records the cadence instead of running it.
///
/// Clones share their record, so a test can keep a handle while the
/// orchestrator owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    fail_on: Option<String>,
    executed: Arc<Mutex<Vec<(String, Parameters)>>>,
}

impl MockBackend {
    /// Create a backend where every worker succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named worker fail.
    #[must_use]
    pub fn fail_on(mut self, worker: impl Into<String>) -> Self {
        self.fail_on = Some(worker.into());
        self
    }

    /// Names of the workers that were started, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Parameters a worker was started with.
    #[must_use]
    pub fn parameters_of(&self, worker: &str) -> Option<Parameters> {
        self.executed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .find(|(name, _)| name == worker)
            .map(|(_, params)| params.clone())
    }
}

impl ExecutionBackend for MockBackend {
    fn run_cadence(
        &self,
        _params: &SystemParams,
        workers: &WorkerSet,
    ) -> Result<(), WorkerFailure> {
        let mut executed = self
            .executed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for worker in workers {
            log::info!("Would execute worker: {}", worker.name);
            executed.push((worker.name.clone(), worker.parameters.clone()));
            if self.fail_on.as_deref() == Some(worker.name.as_str()) {
                return Err(WorkerFailure::new(&worker.name, "mock failure"));
            }
        }
        Ok(())
    }
}
