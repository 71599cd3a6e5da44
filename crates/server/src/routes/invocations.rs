use crate::error::ServerResult;
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use embedrec::CSV_MEDIA_TYPE;
use std::sync::Arc;

/// Recommend items for a CSV batch of item keys.
///
/// The body is header-less CSV whose first column holds (possibly
/// zero-padded) item keys. The response is `text/csv` with one recommended
/// key per line, most similar first.
///
/// Non-CSV requests are rejected with 415 before the model is touched.
/// Inference is CPU-bound and runs on the blocking pool against the table
/// that was current when the request arrived.
pub async fn invocations(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let pipeline = state.pipeline();
    let csv = tokio::task::spawn_blocking(move || {
        pipeline.invoke(content_type.as_deref(), &body)
    })
    .await??;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, CSV_MEDIA_TYPE)], csv))
}
