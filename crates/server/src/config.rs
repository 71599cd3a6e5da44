use embedrec::PipelineConfig;
use model::ModelConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Enable permissive CORS
    #[serde(default)]
    pub enable_cors: bool,

    /// Log filter directive (`info`, `server=debug,embedrec=debug`, ...)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default = "default_true")]
    pub log_json: bool,

    /// Expose `/metrics` in Prometheus text format
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Model artifact location and index tuning
    #[serde(default)]
    pub model: ModelConfig,

    /// Per-request recommendation settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: false,
            log_level: default_log_level(),
            log_json: default_true(),
            metrics_enabled: default_true(),
            model: ModelConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and config files
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(environment())
    }

    fn load_with(env: config::Environment) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("server").required(false))
            // Override with environment variables
            .add_source(env);

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be non-zero");
        }
        if self.pipeline.top_k == 0 {
            anyhow::bail!("pipeline.top_k must be at least 1");
        }
        if self.model.ann.max_results <= self.pipeline.top_k {
            anyhow::bail!(
                "model.ann.max_results ({}) must exceed pipeline.top_k ({}) to leave room for the self-match",
                self.model.ann.max_results,
                self.pipeline.top_k
            );
        }
        if self.model.model_file.is_empty() {
            anyhow::bail!("model.model_file must not be empty");
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

/// `EMBEDREC_SERVER__MODEL__MODEL_DIR` style variables; `__` nests sections.
fn environment() -> config::Environment {
    config::Environment::with_prefix("EMBEDREC_SERVER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_body_size_mb() -> usize {
    6
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
