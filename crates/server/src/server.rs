//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration for `/ping`, `/invocations` and `/metrics`
//! - Middleware stack (request ids, logging, timeout, compression, CORS)
//! - Model reload on SIGHUP
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{health, invocations, not_found};
use crate::state::ServerState;
use crate::telemetry::{init_tracing, install_metrics};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Middleware stack (outermost first):
/// 1. Tracing spans
/// 2. Request ID tracking
/// 3. Request logging
/// 4. CORS (when enabled)
/// 5. Compression
/// 6. Timeout handling
/// 7. Body size limit
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let mut router = Router::new()
        .route("/ping", get(health::ping))
        .route("/invocations", post(invocations::invocations));

    if state.config.metrics_enabled {
        router = router.route("/metrics", get(health::metrics));
    }

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the embedrec HTTP server
///
/// Initializes logging and metrics, loads the model, and serves until
/// SIGTERM or Ctrl+C. A model that fails to load aborts startup, so the
/// service never reports healthy without a table.
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    init_tracing(&config);

    let load_config = config.clone();
    let mut state = tokio::task::spawn_blocking(move || ServerState::load(load_config))
        .await?
        .map_err(|err| anyhow::anyhow!("failed to load model: {err}"))?;

    if config.metrics_enabled {
        state = state.with_metrics(install_metrics()?);
    }
    let state = Arc::new(state);

    let model = state.model();
    tracing::info!(
        path = %config.model.model_path().display(),
        vectors = model.len(),
        dimension = model.dimension(),
        top_k = config.pipeline.top_k,
        "Model ready"
    );
    drop(model);

    spawn_reload_listener(state.clone());

    let app = build_router(state);
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!("Starting embedrec server on {}", addr);
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        config.enable_cors,
        config.metrics_enabled
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Reload the model from disk on SIGHUP. A failed reload keeps the current
/// table in service.
#[cfg(unix)]
fn spawn_reload_listener(state: Arc<ServerState>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(error = %err, "SIGHUP handler unavailable, model reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP, reloading model");
            let reload_state = state.clone();
            match tokio::task::spawn_blocking(move || reload_state.reload_model()).await {
                Ok(Ok(())) => tracing::info!(vectors = state.model().len(), "Model reloaded"),
                Ok(Err(err)) => tracing::error!(error = %err, "Model reload failed, keeping current model"),
                Err(err) => tracing::error!(error = %err, "Model reload task failed"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_listener(_state: Arc<ServerState>) {}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
