use stockcast_core::{run_forecast, AppConfig, LinearTrendForecaster};

use crate::cli::ForecastArgs;
use crate::error::CliError;

use super::CommandOutput;

pub async fn run(args: &ForecastArgs, config: &AppConfig) -> Result<CommandOutput, CliError> {
    let request = super::history_request(&args.range)?;
    let records = super::history::load(&config.history_service(), &request, None).await?;

    let points = run_forecast(&LinearTrendForecaster::default(), &records, args.days)?;
    tracing::info!(history = records.len(), days = args.days, "forecast complete");
    Ok(CommandOutput::Forecast(points))
}
