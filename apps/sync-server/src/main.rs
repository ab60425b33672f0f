//! # Recall Sync Server
//!
//! HTTP server for delta synchronization with Recall clients.
//!
//! ## Startup Sequence
//! ```text
//! tracing init ──► config (env) ──► open store + migrations ──►
//! build router ──► serve with graceful shutdown
//! ```

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use recall_db::{Database, DbConfig};
use recall_sync::SyncService;
use recall_sync_server::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Recall sync server...");

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        port = config.http_port,
        db_path = %config.database_path,
        "Configuration loaded"
    );

    // Open the server store (runs migrations)
    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    info!("Server store ready");

    // Build shared state
    let state = AppState {
        sync: Arc::new(SyncService::new(db)),
    };

    // Start server
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
