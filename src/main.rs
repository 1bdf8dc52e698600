use clap::Parser;
use gplus::app::run;
use gplus::cli::Cli;
use gplus::logging::init_logging;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), "gplus starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Name the failing stage; remediation differs for each.
            eprintln!("error [{}]: {}", e.stage(), e);
            ExitCode::FAILURE
        }
    }
}
