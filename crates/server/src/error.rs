use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use embedrec::PipelineError;
use model::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type ServerResult<T> = Result<T, ServerError>;

/// Body returned with a 415, matching what inference clients expect.
pub const CSV_ONLY_MESSAGE: &str = "This predictor only supports CSV data";

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Pipeline(err) => match err {
                PipelineError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                PipelineError::Parse(_) => StatusCode::BAD_REQUEST,
                PipelineError::NoResolvableKeys { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Model(_) | PipelineError::Serialize(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Model(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Pipeline(err) => match err {
                PipelineError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
                PipelineError::Parse(_) => "PARSE_ERROR",
                PipelineError::NoResolvableKeys { .. } => "NO_RESOLVABLE_KEYS",
                PipelineError::Model(ModelError::InvalidVector { .. }) => "INVALID_VECTOR",
                PipelineError::Model(_) | PipelineError::Serialize(_) => "INTERNAL_ERROR",
            },
            ServerError::Model(ModelError::InvalidVector { .. }) => "INVALID_VECTOR",
            ServerError::Model(_) => "MODEL_ERROR",
            ServerError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            return (
                status,
                [(header::CONTENT_TYPE, "text/plain")],
                CSV_ONLY_MESSAGE,
            )
                .into_response();
        }

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("inference task failed: {err}"))
    }
}
