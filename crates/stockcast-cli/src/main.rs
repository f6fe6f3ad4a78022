mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use stockcast_core::AppConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let output = commands::run(&cli, &config).await?;
    output::render(&output, cli.format, cli.pretty)
}
