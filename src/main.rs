// Entrypoint for the CLI application.
// - Keeps `main` small: parse the command line, set up logging and hand
//   over to `app::execute`.
// - Usage errors exit with 2 (like clap's own), everything else with 1.

use std::process::ExitCode;

use clap::Parser;
use shbin::{app, cli::Cli, error::UsageError, ui};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match app::execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<UsageError>() {
            Some(usage) => {
                ui::error(&usage.to_string());
                eprintln!("\nFor more information, try '--help'.");
                ExitCode::from(2)
            }
            None => {
                ui::error(&format!("{err:#}"));
                ExitCode::FAILURE
            }
        },
    }
}

/// `SHBIN_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("SHBIN_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
