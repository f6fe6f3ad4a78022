mod cache_key;
mod forecast;
mod history;

use stockcast_core::{AppConfig, ForecastRecord, HistoryRequest, Interval, StockRecord};

use crate::cli::{Cli, Command, RangeArgs};
use crate::error::CliError;

/// What a command produced, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Records(Vec<StockRecord>),
    Forecast(Vec<ForecastRecord>),
    CacheKey(String),
}

pub async fn run(cli: &Cli, config: &AppConfig) -> Result<CommandOutput, CliError> {
    match &cli.command {
        Command::History(args) => history::run(args, config).await,
        Command::Forecast(args) => forecast::run(args, config).await,
        Command::CacheKey(args) => cache_key::run(args),
    }
}

fn history_request(range: &RangeArgs) -> Result<HistoryRequest, CliError> {
    let interval: Interval = range.interval.parse()?;
    Ok(HistoryRequest::from_dates(
        &range.symbol,
        &range.start,
        &range.end,
        interval,
    )?)
}
