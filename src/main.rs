use anyhow::Result;
use passkey_auth::{create_app, AppConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    // ---
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections..."),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    // Pick up a local .env file when present
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber to log to stdout, RUST_LOG overrides the level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    let app = create_app(&config).await?;

    let endpoint = config.server.bind_addr;
    info!("Starting at endpoint:{}", endpoint);
    info!(
        "Starting Passkey Authentication Service v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let listener = tokio::net::TcpListener::bind(endpoint).await?;
    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = app.sweeper {
        sweeper.stop().await;
    }
    info!("Server stopped");

    Ok(())
}
