// Visor API Server
// Main entry point for the user, role and policy management REST API

use dotenvy::dotenv;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use visor_api::{bootstrap, create_router, AppConfig, AppState};

const DEFAULT_LOG_FILTER: &str = "info,visor_api=debug,tower_http=debug";

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.log.format);

    tracing::info!("Starting Visor API Server");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.environment);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::build(config).await?);
    bootstrap::prepare_database(&state).await;
    let cleanup = bootstrap::spawn_session_cleanup(state.clone(), bootstrap::SESSION_CLEANUP_INTERVAL);

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    state.db.close().await;
    Ok(())
}
