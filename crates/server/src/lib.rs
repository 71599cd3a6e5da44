//! embedrec server - HTTP inference front end for item recommendations
//!
//! Exposes a loaded embedding table through the two-route model-serving
//! contract:
//!
//! - `GET /ping` - liveness, backed by the model directory on disk
//! - `POST /invocations` - CSV batch of item keys in, CSV recommendations out
//!
//! plus `GET /metrics` for Prometheus when enabled.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! Configuration is read from an optional `server.{toml,yaml,json}` file and
//! `EMBEDREC_SERVER__*` environment variables; see [`ServerConfig`].

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
