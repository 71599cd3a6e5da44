use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;

/// Liveness probe.
///
/// Healthy when the model directory can be enumerated and still holds the
/// configured artifact. The table itself was validated at startup, so a
/// process that fails to load never answers here.
pub async fn ping(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let dir = &state.config.model.model_dir;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|err| {
        ServerError::ModelUnavailable(format!("cannot read {}: {err}", dir.display()))
    })?;

    let mut found = false;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| ServerError::ModelUnavailable(err.to_string()))?
    {
        tracing::debug!(path = %entry.path().display(), "model directory entry");
        if entry.file_name().to_string_lossy() == state.config.model.model_file {
            found = true;
        }
    }

    if !found {
        return Err(ServerError::ModelUnavailable(format!(
            "{} missing from {}",
            state.config.model.model_file,
            dir.display()
        )));
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/csv")],
        "\n",
    ))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
