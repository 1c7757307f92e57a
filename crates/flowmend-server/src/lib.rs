//! Flowmend Server — HTTP adapter for the process-improvement workflow.
//!
//! A standalone axum backend exposing the orchestrator's operations as a
//! REST API:
//! - session lifecycle + improvement pipeline under `/api/process`
//! - diagram conversation under `/api/conversation`
//! - diagram optimization under `/api/optimize`
//! - visualize-only pipeline under `/api/visualize`
//!
//! This crate can be used standalone or embedded in other applications.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use flowmend_core::{AppState, AppStateInner};

/// Configuration for the Flowmend backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8620,
        }
    }
}

/// Start the backend server, wiring collaborators from the environment.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowmend_server=info,tower_http=info".into()),
        )
        .init();

    tracing::info!(
        "Starting Flowmend backend server on {}:{}",
        config.host,
        config.port
    );

    let state: AppState = Arc::new(AppStateInner::from_env());
    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// This variant is useful when the collaborators are injected (tests, or an
/// embedding application that already owns the clients).
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    // Build router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Flowmend backend server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "flowmend-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
