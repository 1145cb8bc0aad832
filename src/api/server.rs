use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{health, media_info, start_download},
    state::AppState,
    ws::ws_handler,
};
use crate::config::Config;
use crate::extractor::YtDlpExtractor;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the application router. Shared with the integration tests, which
/// supply their own state (mock extractor, scratch config).
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/info", post(media_info))
        .route("/api/download", post(start_download))
        .route("/ws/{client_id}", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address.unwrap_or(config.server.bind_addr);

    // Completed media lands here; jobs fail fast if it cannot be created.
    info!(path = %config.extractor.downloads_dir.display(), "Ensuring downloads directory");
    tokio::fs::create_dir_all(&config.extractor.downloads_dir)
        .await
        .map_err(|e| format!("Failed to create downloads dir: {}", e))?;

    let extractor = Arc::new(YtDlpExtractor::new(config.extractor.clone()));
    let state = AppState::new(config, extractor);
    let registry = state.registry.clone();

    let app = app(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Clipbox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight jobs are detached and fire-and-forget; closing the channels
    // turns their remaining progress sends into no-ops.
    registry.shutdown_all().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
