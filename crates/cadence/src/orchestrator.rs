//! Worker cadence orchestration.
//!
//! A run moves through these states:
//!
//! ```text
//! NotStarted -> DirectoryPrepared -> CadenceRunning -> Succeeded -> RebootTriggered
//!                                                   \-> Failed
//! ```
//!
//! `Failed` is terminal: a failed cadence never reboots the system,
//! whatever the reboot preference.

use crate::backend::ExecutionBackend;
use crate::error::{Error, Result};
use crate::params::SystemParams;
use crate::types::{Outcome, WorkerSet};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has happened yet.
    NotStarted,
    /// The working directory exists.
    DirectoryPrepared,
    /// The backend is executing workers.
    CadenceRunning,
    /// Every worker succeeded.
    Succeeded,
    /// Directory preparation or a worker failed.
    Failed,
    /// The restart command was issued.
    RebootTriggered,
}

/// Issues the restart command.
pub trait RestartTrigger {
    /// Start `command` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `Error::RestartFailed` if the command could not be started.
    fn trigger(&self, command: &str) -> Result<()>;
}

/// Runs the restart command through the system shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRestart;

impl RestartTrigger for ShellRestart {
    fn trigger(&self, command: &str) -> Result<()> {
        let mut shell = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };

        shell
            .arg(command)
            .stdin(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|source| Error::RestartFailed {
                command: command.to_string(),
                source,
            })
    }
}

/// Records restart commands instead of running them.
#[derive(Debug, Clone, Default)]
pub struct RecordingRestart {
    commands: Arc<Mutex<Vec<String>>>,
}

impl RecordingRestart {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands triggered so far.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl RestartTrigger for RecordingRestart {
    fn trigger(&self, command: &str) -> Result<()> {
        self.commands
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(command.to_string());
        Ok(())
    }
}

/// Drives one run through its states.
struct Run {
    state: RunState,
}

impl Run {
    fn new() -> Self {
        Self {
            state: RunState::NotStarted,
        }
    }

    fn advance(&mut self, next: RunState) {
        log::debug!("Run state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Execute the workers against the system.
///
/// Creates the working directory, runs the cadence on `backend`, and on
/// success issues the restart command unless `no_reboot` is set.
///
/// # Errors
///
/// Returns `Error::DirectoryPreparationFailed` if the working directory
/// cannot be created, `Error::CadenceFailed` if a worker fails (no restart
/// is issued in either case), or `Error::RestartFailed` if the restart
/// command cannot be started.
pub fn install(
    workers: &WorkerSet,
    params: &SystemParams,
    backend: &dyn ExecutionBackend,
    restart: &dyn RestartTrigger,
    no_reboot: bool,
) -> Result<Outcome> {
    let mut run = Run::new();
    log::info!("Start time: {}", chrono::Local::now());
    log::info!(
        "Workers to execute: {}",
        workers.names().collect::<Vec<_>>().join(", ")
    );

    if let Err(err) = prepare_dir(Path::new(&params.workingdir)) {
        run.advance(RunState::Failed);
        log::error!("{}", err);
        return Err(err);
    }
    run.advance(RunState::DirectoryPrepared);

    run.advance(RunState::CadenceRunning);
    if let Err(failure) = backend.run_cadence(params, workers) {
        run.advance(RunState::Failed);
        log::error!("Execution of the workers cadence has failed.");
        return Err(failure.into());
    }
    run.advance(RunState::Succeeded);

    let outcome = if no_reboot {
        log::info!("Detected `no-reboot` switch. System will not be rebooted.");
        Outcome::Succeeded
    } else {
        log::info!("Reboot scheduled. System will reboot after the script exits.");
        restart.trigger(&params.restart).inspect_err(|err| {
            log::error!("{}", err);
        })?;
        run.advance(RunState::RebootTriggered);
        Outcome::RebootTriggered
    };

    log::info!("Stop time: {}", chrono::Local::now());
    Ok(outcome)
}

/// Create `dir`, tolerating a concurrent creator.
fn prepare_dir(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(_) if dir.is_dir() => Ok(()),
        Err(source) => Err(Error::DirectoryPreparationFailed {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
