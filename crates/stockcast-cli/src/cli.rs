//! CLI argument definitions for stockcast.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `history` | Fetch historical prices through the cache |
//! | `forecast` | Fetch history and project it forward |
//! | `cache-key` | Print the cache key for a request |
//!
//! # Examples
//!
//! ```bash
//! stockcast history AAPL --start 2024-01-01 --end 2024-02-01
//! stockcast history MSFT --start 2023-01-01 --end 2024-01-01 --interval 1wk --csv msft.csv
//! stockcast forecast AAPL --start 2023-01-01 --end 2024-01-01 --days 60 --format table
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Historical stock prices with a Redis cache in front, plus forecasts.
///
/// Connection settings come from the environment (or a `.env` file):
/// REDIS_HOST, REDIS_PORT, CACHE_BACKEND, UPSTREAM_BASE_URL and friends.
#[derive(Debug, Parser)]
#[command(name = "stockcast", author, version, about)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table for terminal display.
    Table,
    /// JSON array output.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch historical OHLCV records for a symbol.
    ///
    /// Served from the cache when a matching entry exists, otherwise fetched
    /// upstream and written back for an hour.
    History(HistoryArgs),

    /// Fetch history, fit the trend model and project it forward.
    Forecast(ForecastArgs),

    /// Print the cache key a history request would use.
    CacheKey(RangeArgs),
}

/// Symbol, date range and interval shared by every command.
#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Market symbol (e.g. AAPL, BRK-B, ^GSPC).
    pub symbol: String,

    /// First day of the range, inclusive (YYYY-MM-DD, UTC).
    #[arg(long)]
    pub start: String,

    /// Last day of the range, exclusive (YYYY-MM-DD, UTC).
    #[arg(long)]
    pub end: String,

    /// Bar interval: 1m 2m 5m 15m 30m 60m 90m 1h 1d 5d 1wk 1mo 3mo.
    #[arg(long, default_value = "1d")]
    pub interval: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Also write the records to this CSV file.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Bypass the cache for this call.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Number of future days to predict.
    #[arg(long, default_value_t = stockcast_core::DEFAULT_HORIZON_DAYS)]
    pub days: u32,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn history_defaults_to_daily_json() {
        let cli = Cli::try_parse_from([
            "stockcast", "history", "AAPL", "--start", "2024-01-01", "--end", "2024-02-01",
        ])
        .expect("valid arguments");

        assert_eq!(cli.format, OutputFormat::Json);
        let Command::History(args) = cli.command else {
            panic!("expected history command");
        };
        assert_eq!(args.range.interval, "1d");
        assert!(args.csv.is_none());
        assert!(!args.no_cache);
    }

    #[test]
    fn forecast_accepts_days_and_global_format() {
        let cli = Cli::try_parse_from([
            "stockcast", "forecast", "MSFT", "--start", "2023-01-01", "--end", "2024-01-01",
            "--days", "7", "--format", "table",
        ])
        .expect("valid arguments");

        assert_eq!(cli.format, OutputFormat::Table);
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast command");
        };
        assert_eq!(args.days, 7);
        assert_eq!(args.range.symbol, "MSFT");
    }

    #[test]
    fn range_requires_both_dates() {
        assert!(Cli::try_parse_from(["stockcast", "cache-key", "AAPL", "--start", "2024-01-01"]).is_err());
    }
}
