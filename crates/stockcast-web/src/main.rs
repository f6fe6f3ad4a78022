use std::process::ExitCode;

use stockcast_core::AppConfig;
use stockcast_web::{app, AppState, ServerError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let config = AppConfig::from_env();
    let addr = config.server.socket_addr()?;

    tracing::info!(
        cache = ?config.cache.backend,
        upstream = %config.upstream.base_url,
        "starting stockcast api"
    );

    let router = app(AppState::from_config(&config), &config.cors);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("stockcast api listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, stopping");
}
