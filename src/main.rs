mod cli;
mod logging;
mod ui;
mod workers;

use cadence::{Client, ExecutionBackend, MockBackend, Outcome, SystemKind};
use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use workers::ProcessBackend;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(cli.log_level, cli.log_dir.as_deref()) {
        ui::error(&format!("{err:#}"));
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(outcome) => {
            report(&cli, outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let category = err.category();
            ui::error(&format!("{}: {}", category, err));
            ui::hint(category.advice());
            ExitCode::from(u8::try_from(category.exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: &Cli) -> cadence::Result<Outcome> {
    let client = Client::new(cli.to_run_arguments())?;

    ui::info(&format!(
        "Cadence for {}: {}",
        client.system(),
        client.workers().names().collect::<Vec<_>>().join(", ")
    ));
    ui::kv("config", &client.config_location().to_string());
    ui::kv("workingdir", &client.system_params().workingdir);

    if cli.dry_run {
        ui::warn("Dry run: workers will not be executed");
        return client.dry_run(&MockBackend::new());
    }

    client.install_with(&|kind: SystemKind| -> Box<dyn ExecutionBackend> {
        Box::new(ProcessBackend::new(kind))
    })
}

fn report(cli: &Cli, outcome: Outcome) {
    match outcome {
        Outcome::RebootTriggered => ui::success("Cadence complete. System will reboot shortly."),
        Outcome::Succeeded if cli.dry_run => ui::success("Dry run complete"),
        Outcome::Succeeded => ui::success("Cadence complete. Reboot suppressed."),
    }
}
