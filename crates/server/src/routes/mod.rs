//! API route handlers
//!
//! - `health`: liveness (`/ping`) and Prometheus metrics
//! - `invocations`: CSV batch in, recommendations out

pub mod health;
pub mod invocations;

use crate::error::ServerError;

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
