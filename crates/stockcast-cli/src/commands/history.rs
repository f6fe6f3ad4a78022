use std::path::Path;

use stockcast_core::{
    export_csv, AppConfig, CacheBackend, HistoryRequest, HistoryService, StockRecord,
};

use crate::cli::HistoryArgs;
use crate::error::CliError;

use super::CommandOutput;

pub async fn run(args: &HistoryArgs, config: &AppConfig) -> Result<CommandOutput, CliError> {
    let request = super::history_request(&args.range)?;
    let service = if args.no_cache {
        let mut config = config.clone();
        config.cache.backend = CacheBackend::Disabled;
        config.history_service()
    } else {
        config.history_service()
    };

    let records = load(&service, &request, args.csv.as_deref()).await?;
    Ok(CommandOutput::Records(records))
}

/// Looks `request` up through `service`, exporting to `csv` when given.
pub(crate) async fn load(
    service: &HistoryService,
    request: &HistoryRequest,
    csv: Option<&Path>,
) -> Result<Vec<StockRecord>, CliError> {
    let response = service.lookup(request).await?;
    tracing::info!(
        symbol = %request.symbol,
        rows = response.records.len(),
        served_from = ?response.served_from,
        "history loaded"
    );

    if let Some(path) = csv {
        export_csv(path, &response.records)?;
        tracing::info!(path = %path.display(), "wrote csv");
    }

    Ok(response.records)
}
