//! # cadence
//!
//! Configuration resolution and worker cadence orchestration for system
//! provisioning.
//!
//! A run takes a YAML document listing named workers per operating system,
//! merges the list for the current system with the global `all` list,
//! resolves the system's directories and restart command, executes the
//! workers in order through an [`ExecutionBackend`], and schedules a reboot
//! when everything succeeded.
//!
//! ## Example
//!
//! ```no_run
//! use cadence::{Client, RunArguments};
//! use cadence::backend::MockBackend;
//!
//! let args = RunArguments::new()
//!     .config_source("/etc/watchmaker/config.yaml")
//!     .environment("dev")
//!     .no_reboot(true);
//!
//! let client = Client::new(args).expect("configuration failed");
//! for worker in client.workers() {
//!     println!("{}: {:?}", worker.name, worker.parameters);
//! }
//!
//! client.install(&MockBackend::new()).expect("cadence failed");
//! ```
//!
//! ## Configuration document
//!
//! ```yaml
//! all:
//!   - salt:
//!       salt_states: Highstate
//! linux:
//!   - yum:
//!       repo_map: []
//! windows:
//!   - salt:
//!       ash_role: MemberServer
//! ```
//!
//! On Linux this yields the cadence `yum, salt`; on Windows `salt`, with the
//! `all` parameters merged over the Windows ones. Override parameters from
//! [`RunArguments`] win over anything in the document.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod params;
pub mod platform;
pub mod source;
pub mod types;

pub use backend::{BackendFactory, ExecutionBackend, MockBackend, WorkerFailure};
pub use error::{Error, ErrorCategory, Result};
pub use merge::OverrideParameters;
pub use orchestrator::{RecordingRestart, RestartTrigger, RunState, ShellRestart};
pub use params::SystemParams;
pub use platform::{CurrentHost, Host, StaticHost, SystemKind};
pub use source::{ConfigLocation, MockTransport, Transport, UreqTransport};
pub use types::{LogLevel, Outcome, Parameters, RunArguments, WorkerEntry, WorkerSet};

/// Version reported in the run header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version string.
#[must_use]
pub fn version() -> &'static str {
    VERSION
}

/// Configures and builds a [`Client`].
///
/// Every collaborator defaults to the real implementation; tests swap them
/// for deterministic ones.
pub struct ClientBuilder {
    args: RunArguments,
    host: Box<dyn Host>,
    transport: Box<dyn Transport>,
    restart: Box<dyn RestartTrigger>,
    system_root: Option<String>,
}

impl ClientBuilder {
    /// Use a different host for platform detection and environment lookups.
    #[must_use]
    pub fn host(mut self, host: impl Host + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// Use a different transport for URL configurations.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    /// Use a different restart trigger.
    #[must_use]
    pub fn restart(mut self, restart: impl RestartTrigger + 'static) -> Self {
        self.restart = Box::new(restart);
        self
    }

    /// Resolve system paths beneath `root` instead of the real system root.
    #[must_use]
    pub fn system_root(mut self, root: impl Into<String>) -> Self {
        self.system_root = Some(root.into());
        self
    }

    /// Resolve the system parameters and the merged worker configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedSystem`, `Error::ConfigurationUnreachable`
    /// or `Error::MalformedConfiguration`. The error is logged before it is
    /// returned.
    pub fn build(self) -> Result<Client> {
        let Self {
            args,
            host,
            transport,
            restart,
            system_root,
        } = self;

        log::info!("{}", run_header());
        log::debug!("Watchmaker Version: {}", VERSION);
        log::debug!("Parameters: {}", describe_parameters(&args));
        log::debug!("Extra Parameters: {:?}", args.extra_arguments);

        let system = SystemKind::detect(&host.os()).inspect_err(|err| log::error!("{}", err))?;
        let params = SystemParams::resolve(
            system,
            host.as_ref(),
            system_root.as_deref(),
            args.log_dir.as_deref(),
        );
        log::debug!("System Type: {}", system);
        log::debug!("System Parameters: {:?}", params.to_map());

        let overrides = OverrideParameters::from_arguments(&args);
        let location = ConfigLocation::parse(args.config_source.as_deref());
        let document = location.load(transport.as_ref())?;
        let workers = merge::merge(&document, system.config_key(), &overrides).inspect_err(|err| {
            log::error!("{}", err);
        })?;

        Ok(Client {
            no_reboot: args.no_reboot,
            system,
            params,
            location,
            overrides,
            workers,
            restart,
        })
    }
}

/// Prepares a system for setup and installation.
///
/// Construction resolves everything up front; [`Client::install`] then only
/// touches the filesystem, the backend and the restart command.
pub struct Client {
    system: SystemKind,
    params: SystemParams,
    location: ConfigLocation,
    overrides: OverrideParameters,
    workers: WorkerSet,
    no_reboot: bool,
    restart: Box<dyn RestartTrigger>,
}

impl Client {
    /// Resolve a run on the current machine.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::build`].
    pub fn new(args: RunArguments) -> Result<Self> {
        Self::builder(args).build()
    }

    /// Start configuring a run with custom collaborators.
    #[must_use]
    pub fn builder(args: RunArguments) -> ClientBuilder {
        ClientBuilder {
            args,
            host: Box::new(CurrentHost),
            transport: Box::new(UreqTransport::new()),
            restart: Box::new(ShellRestart),
            system_root: None,
        }
    }

    /// The detected system.
    #[must_use]
    pub fn system(&self) -> SystemKind {
        self.system
    }

    /// Resolved directories and restart command.
    #[must_use]
    pub fn system_params(&self) -> &SystemParams {
        &self.params
    }

    /// Merged workers, in execution order.
    #[must_use]
    pub fn workers(&self) -> &WorkerSet {
        &self.workers
    }

    /// Overrides applied to every worker.
    #[must_use]
    pub fn overrides(&self) -> &OverrideParameters {
        &self.overrides
    }

    /// Where the configuration was read from.
    #[must_use]
    pub fn config_location(&self) -> &ConfigLocation {
        &self.location
    }

    /// Whether the reboot is suppressed.
    #[must_use]
    pub fn no_reboot(&self) -> bool {
        self.no_reboot
    }

    /// Execute the workers against the system.
    ///
    /// # Errors
    ///
    /// See [`orchestrator::install`].
    pub fn install(&self, backend: &dyn ExecutionBackend) -> Result<Outcome> {
        orchestrator::install(
            &self.workers,
            &self.params,
            backend,
            self.restart.as_ref(),
            self.no_reboot,
        )
    }

    /// Execute the workers with the backend `factory` picks for this system.
    ///
    /// # Errors
    ///
    /// See [`orchestrator::install`].
    pub fn install_with(&self, factory: BackendFactory<'_>) -> Result<Outcome> {
        let backend = factory(self.system);
        self.install(backend.as_ref())
    }

    /// Run the cadence on `backend` without touching the system.
    ///
    /// No directory is created and no restart is issued, whatever the
    /// reboot preference.
    ///
    /// # Errors
    ///
    /// Returns `Error::CadenceFailed` if a worker fails.
    pub fn dry_run(&self, backend: &dyn ExecutionBackend) -> Result<Outcome> {
        log::info!(
            "Dry run of workers: {}",
            self.workers.names().collect::<Vec<_>>().join(", ")
        );
        backend
            .run_cadence(&self.params, &self.workers)
            .inspect_err(|_| log::error!("Execution of the workers cadence has failed."))?;
        Ok(Outcome::Succeeded)
    }
}

/// `' WATCHMAKER RUN '` centred in a line of 80 `#`.
fn run_header() -> String {
    let title = " WATCHMAKER RUN ";
    let width = 40 + title.len() / 2;
    format!("{:#<80}", format!("{:#>width$}", title))
}

fn describe_parameters(args: &RunArguments) -> String {
    let mut value = serde_json::to_value(args).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        map.remove("extra_arguments");
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CONFIG: &str = "
all:
  - salt:
      salt_states: Highstate
      environment: prod
linux:
  - yum:
      repo: base
  - salt:
      install_method: yum
windows:
  - salt:
      ash_role: MemberServer
";

    fn write_config(dir: &Path, text: &str) -> String {
        let path = dir.join("config.yaml");
        fs::write(&path, text).unwrap();
        path.display().to_string()
    }

    fn linux_client(temp: &TempDir, args: RunArguments) -> Result<Client> {
        Client::builder(args)
            .host(StaticHost::new("linux"))
            .transport(MockTransport::new())
            .restart(RecordingRestart::new())
            .system_root(temp.path().display().to_string())
            .build()
    }

    #[test]
    fn test_client_merges_for_current_system() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new().config_source(write_config(temp.path(), CONFIG));
        let client = linux_client(&temp, args).unwrap();

        assert_eq!(client.system(), SystemKind::Unix);
        assert_eq!(client.workers().names().collect::<Vec<_>>(), ["yum", "salt"]);
        let salt = &client.workers().get("salt").unwrap().parameters;
        assert_eq!(salt["install_method"], json!("yum"));
        assert_eq!(salt["salt_states"], json!("Highstate"));
    }

    #[test]
    fn test_client_windows_host() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new().config_source(write_config(temp.path(), CONFIG));
        let client = Client::builder(args)
            .host(StaticHost::new("Windows").with_var("SYSTEMDRIVE", "C:"))
            .transport(MockTransport::new())
            .build()
            .unwrap();

        assert_eq!(client.system(), SystemKind::Windows);
        assert_eq!(client.system_params().prepdir, r"C:\Watchmaker");
        assert_eq!(client.workers().names().collect::<Vec<_>>(), ["salt"]);
        assert_eq!(
            client.workers().get("salt").unwrap().parameters["ash_role"],
            json!("MemberServer")
        );
    }

    #[test]
    fn test_client_overrides_win() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new()
            .config_source(write_config(temp.path(), CONFIG))
            .environment("dev")
            .extra_arguments(["--salt-states", "None"]);
        let client = linux_client(&temp, args).unwrap();

        let salt = &client.workers().get("salt").unwrap().parameters;
        assert_eq!(salt["environment"], json!("dev"));
        assert_eq!(salt["salt_states"], json!("None"));
        let yum = &client.workers().get("yum").unwrap().parameters;
        assert_eq!(yum["environment"], json!("dev"));
        assert!(client.overrides().get("admin_users").is_none());
    }

    #[test]
    fn test_client_log_dir_override() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new()
            .config_source(write_config(temp.path(), CONFIG))
            .log_dir("/srv/logs");
        let client = linux_client(&temp, args).unwrap();
        assert_eq!(client.system_params().logdir, "/srv/logs");
    }

    #[test]
    fn test_client_bundled_config() {
        let temp = TempDir::new().unwrap();
        let client = linux_client(&temp, RunArguments::new()).unwrap();
        assert!(client.config_location().is_bundled());
        assert!(!client.workers().is_empty());
    }

    #[test]
    fn test_client_url_config() {
        let temp = TempDir::new().unwrap();
        let url = "https://example.com/watchmaker/config.yaml";
        let client = Client::builder(RunArguments::new().config_source(url))
            .host(StaticHost::new("linux"))
            .transport(MockTransport::new().with_document(url, CONFIG))
            .system_root(temp.path().display().to_string())
            .build()
            .unwrap();

        assert_eq!(client.config_location(), &ConfigLocation::Url(url.to_string()));
        assert_eq!(client.workers().len(), 2);
    }

    #[test]
    fn test_client_unreachable_url() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new().config_source("https://example.com/missing.yaml");
        let err = linux_client(&temp, args).err().unwrap();
        assert!(matches!(err, Error::ConfigurationUnreachable { .. }));
    }

    #[test]
    fn test_client_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml").display().to_string();
        let err = linux_client(&temp, RunArguments::new().config_source(missing))
            .err()
            .unwrap();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_client_no_workers_for_system() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new()
            .config_source(write_config(temp.path(), "windows:\n  - salt: {}\n"));
        let err = linux_client(&temp, args).err().unwrap();
        assert!(matches!(err, Error::MalformedConfiguration(_)));
    }

    #[test]
    fn test_client_unsupported_system() {
        let result = Client::builder(RunArguments::new())
            .host(StaticHost::new("freebsd"))
            .transport(MockTransport::new())
            .build();
        assert!(matches!(result, Err(Error::UnsupportedSystem { .. })));
    }

    #[test]
    fn test_client_install_reboots_on_success() {
        let temp = TempDir::new().unwrap();
        let restart = RecordingRestart::new();
        let client = Client::builder(
            RunArguments::new().config_source(write_config(temp.path(), CONFIG)),
        )
        .host(StaticHost::new("linux"))
        .restart(restart.clone())
        .system_root(temp.path().display().to_string())
        .build()
        .unwrap();

        let backend = MockBackend::new();
        let outcome = client.install(&backend).unwrap();

        assert!(outcome.rebooted());
        assert_eq!(backend.executed(), ["yum", "salt"]);
        assert_eq!(restart.commands(), ["shutdown -r +1 &"]);
        assert!(Path::new(&client.system_params().workingdir).is_dir());
    }

    #[test]
    fn test_client_install_failure_suppresses_reboot() {
        let temp = TempDir::new().unwrap();
        let restart = RecordingRestart::new();
        let config = "linux:\n  - a: {}\n  - b: {}\n  - c: {}\n";
        let client = Client::builder(
            RunArguments::new().config_source(write_config(temp.path(), config)),
        )
        .host(StaticHost::new("linux"))
        .restart(restart.clone())
        .system_root(temp.path().display().to_string())
        .build()
        .unwrap();

        let backend = MockBackend::new().fail_on("b");
        let err = client.install(&backend).unwrap_err();

        assert_eq!(err.failed_worker(), Some("b"));
        assert_eq!(backend.executed(), ["a", "b"]);
        assert!(restart.commands().is_empty());
    }

    #[test]
    fn test_client_dry_run_leaves_system_untouched() {
        let temp = TempDir::new().unwrap();
        let restart = RecordingRestart::new();
        let client = Client::builder(
            RunArguments::new().config_source(write_config(temp.path(), CONFIG)),
        )
        .host(StaticHost::new("linux"))
        .restart(restart.clone())
        .system_root(temp.path().join("root").display().to_string())
        .build()
        .unwrap();

        let backend = MockBackend::new();
        assert_eq!(client.dry_run(&backend).unwrap(), Outcome::Succeeded);

        assert_eq!(backend.executed(), ["yum", "salt"]);
        assert!(!temp.path().join("root").exists());
        assert!(restart.commands().is_empty());
    }

    #[test]
    fn test_client_dry_run_reports_failure() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new().config_source(write_config(temp.path(), CONFIG));
        let client = linux_client(&temp, args).unwrap();

        let err = client.dry_run(&MockBackend::new().fail_on("yum")).unwrap_err();
        assert_eq!(err.failed_worker(), Some("yum"));
    }

    #[test]
    fn test_client_install_with_factory() {
        let temp = TempDir::new().unwrap();
        let args = RunArguments::new()
            .config_source(write_config(temp.path(), CONFIG))
            .no_reboot(true);
        let client = linux_client(&temp, args).unwrap();

        let seen = MockBackend::new();
        let handle = seen.clone();
        let factory = move |kind: SystemKind| -> Box<dyn ExecutionBackend> {
            assert_eq!(kind, SystemKind::Unix);
            Box::new(handle.clone())
        };

        assert_eq!(client.install_with(&factory).unwrap(), Outcome::Succeeded);
        assert_eq!(seen.executed(), ["yum", "salt"]);
    }

    #[test]
    fn test_run_header() {
        let header = run_header();
        assert_eq!(header.len(), 80);
        assert!(header.starts_with('#'));
        assert!(header.ends_with('#'));
        assert_eq!(header.find(" WATCHMAKER RUN "), Some(32));
    }

    #[test]
    fn test_describe_parameters_omits_extra_arguments() {
        let args = RunArguments::new().environment("dev").extra_arguments(["--a", "b"]);
        let text = describe_parameters(&args);
        assert!(text.contains("\"environment\":\"dev\""));
        assert!(!text.contains("extra_arguments"));
    }

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
