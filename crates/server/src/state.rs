use crate::config::ServerConfig;
use crate::error::ServerResult;
use embedrec::{EmbeddingModel, KeyedVectors, Pipeline};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::{Arc, RwLock};

/// Shared application state
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Current embedding table. Requests clone the `Arc` once and keep
    /// that table for their whole lifetime; a reload swaps the reference.
    model: RwLock<Arc<dyn EmbeddingModel>>,

    /// Prometheus render handle, present when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Load the configured model and build the state around it.
    pub fn load(config: ServerConfig) -> ServerResult<Self> {
        let model = KeyedVectors::load(&config.model)?;
        Ok(Self::with_model(config, Arc::new(model)))
    }

    /// Build state around an already constructed model.
    pub fn with_model(config: ServerConfig, model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            config: Arc::new(config),
            model: RwLock::new(model),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// The table in service right now.
    pub fn model(&self) -> Arc<dyn EmbeddingModel> {
        self.model
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap in a new table. In-flight requests finish on the old one.
    pub fn replace_model(&self, model: Arc<dyn EmbeddingModel>) {
        let mut guard = self
            .model
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = model;
    }

    /// Re-read the model artifact from disk and swap it in on success.
    pub fn reload_model(&self) -> ServerResult<()> {
        let model = KeyedVectors::load(&self.config.model)?;
        self.replace_model(Arc::new(model));
        Ok(())
    }

    /// Pipeline bound to the current table.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.model(), self.config.pipeline.clone())
    }
}
