//! Logging and Prometheus wiring.

use crate::config::ServerConfig;
use embedrec::{PipelineError, PipelineMetrics, Stage};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
pub fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus recorder and route pipeline stage timings into it.
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    embedrec::set_pipeline_metrics(Some(std::sync::Arc::new(PrometheusPipelineMetrics)));
    Ok(handle)
}

/// Forwards pipeline observations to the `metrics` facade.
#[derive(Debug, Default)]
pub struct PrometheusPipelineMetrics;

impl PipelineMetrics for PrometheusPipelineMetrics {
    fn record_stage(&self, stage: Stage, latency: Duration, success: bool) {
        metrics::histogram!(
            "embedrec_stage_seconds",
            "stage" => stage.as_str(),
            "success" => if success { "true" } else { "false" }
        )
        .record(latency.as_secs_f64());
    }

    fn record_lookups(&self, resolved: usize, skipped: usize) {
        metrics::counter!("embedrec_keys_resolved_total").increment(resolved as u64);
        metrics::counter!("embedrec_keys_skipped_total").increment(skipped as u64);
    }

    fn record_outcome(&self, result: Result<usize, &PipelineError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("embedrec_requests_total", "outcome" => outcome).increment(1);
    }
}
