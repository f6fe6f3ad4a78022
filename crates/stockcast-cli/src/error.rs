use stockcast_core::{ExportError, ForecastError, HistoryError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::History(_) => 3,
            Self::Forecast(_) => 4,
            Self::Serialization(_) => 4,
            Self::Export(_) | Self::Io(_) => 10,
        }
    }
}
