use cadence::{LogLevel, RunArguments};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "watchmaker")]
#[command(author = "Watchmaker Developers")]
#[command(version)]
#[command(about = "Applied Configuration Management", long_about = None)]
pub struct Cli {
    /// Path or URL to the config.yaml file
    #[arg(short, long = "config")]
    pub config: Option<String>,

    /// Set the log level
    #[arg(short, long, default_value_t = LogLevel::Info, value_parser = parse_log_level)]
    pub log_level: LogLevel,

    /// Path to the directory where Watchmaker log files will be saved
    #[arg(short = 'd', long)]
    pub log_dir: Option<PathBuf>,

    /// Do not reboot the system once the cadence completes
    #[arg(short, long)]
    pub no_reboot: bool,

    /// Comma-separated string of salt states to apply
    #[arg(short, long)]
    pub salt_states: Option<String>,

    /// Use S3 utilities to retrieve content instead of http/s utilities
    #[arg(long)]
    pub s3_source: bool,

    /// Set a salt grain that specifies the domain groups to grant admin rights
    #[arg(short = 'A', long)]
    pub admin_groups: Option<String>,

    /// Set a salt grain that specifies the domain users to grant admin rights
    #[arg(short, long)]
    pub admin_users: Option<String>,

    /// Set a salt grain that specifies the computername to apply
    #[arg(short = 't', long)]
    pub computer_name: Option<String>,

    /// Set a salt grain that specifies the environment
    #[arg(short, long = "env")]
    pub environment: Option<String>,

    /// Set a salt grain that specifies a full DN to the OU
    #[arg(short = 'p', long)]
    pub ou_path: Option<String>,

    /// Resolve and log the cadence without executing workers, creating directories, or rebooting
    #[arg(long)]
    pub dry_run: bool,

    /// Extra `--flag value` pairs passed to every worker
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra_arguments: Vec<String>,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    s.parse()
}

impl Cli {
    /// Turn the parsed flags into run arguments.
    pub fn to_run_arguments(&self) -> RunArguments {
        let mut args = RunArguments::new()
            .no_reboot(self.no_reboot || self.dry_run)
            .log_level(self.log_level)
            .extra_arguments(self.extra_arguments.iter().cloned());

        if let Some(config) = &self.config {
            args = args.config_source(config.as_str());
        }
        if let Some(dir) = &self.log_dir {
            args = args.log_dir(dir.clone());
        }
        if let Some(states) = &self.salt_states {
            args = args.salt_states(states.as_str());
        }
        if self.s3_source {
            args = args.s3_source(true);
        }
        if let Some(groups) = &self.admin_groups {
            args = args.admin_groups(groups.as_str());
        }
        if let Some(users) = &self.admin_users {
            args = args.admin_users(users.as_str());
        }
        if let Some(name) = &self.computer_name {
            args = args.computer_name(name.as_str());
        }
        if let Some(env) = &self.environment {
            args = args.environment(env.as_str());
        }
        if let Some(ou) = &self.ou_path {
            args = args.ou_path(ou.as_str());
        }
        args
    }
}
