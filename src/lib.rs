//! Workspace umbrella crate for embedrec.
//!
//! Turns a CSV batch of item identifiers into nearest-neighbor
//! recommendations from a word2vec-style embedding table:
//!
//! 1. check the request declares `text/csv`,
//! 2. read the first column of every row ([`batch::parse_batch`]),
//! 3. strip zero padding from each key ([`batch::normalize_key`]),
//! 4. average the vectors of the keys the table knows ([`aggregate()`]),
//! 5. ask the table for `top_k + 1` neighbors and drop the closest one,
//! 6. write the remaining keys back out as CSV.
//!
//! The table is injected as an [`EmbeddingModel`] so callers (and tests)
//! decide what backs it.

pub mod aggregate;
pub mod batch;

pub use aggregate::{Aggregate, AggregateError, aggregate};
pub use batch::{CSV_MEDIA_TYPE, is_csv, normalize_key, parse_batch, write_recommendations};
pub use model::{
    AnnConfig, EmbeddingModel, KeyedVectors, ModelConfig, ModelError, ModelFormat, Neighbor,
};

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

/// Errors that end a request before a recommendation is produced.
#[derive(Debug)]
pub enum PipelineError {
    /// The request did not declare a CSV body.
    UnsupportedMediaType(Option<String>),
    /// The body is not valid header-less CSV, or holds no rows.
    Parse(String),
    /// Not a single normalized key exists in the table.
    NoResolvableKeys { requested: usize },
    /// The table rejected a query (dimension mismatch and friends).
    Model(ModelError),
    /// Writing the response body failed.
    Serialize(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::UnsupportedMediaType(Some(found)) => {
                write!(f, "unsupported media type {found:?}; only text/csv is accepted")
            }
            PipelineError::UnsupportedMediaType(None) => {
                write!(f, "missing content type; only text/csv is accepted")
            }
            PipelineError::Parse(reason) => write!(f, "malformed CSV batch: {reason}"),
            PipelineError::NoResolvableKeys { requested } => {
                write!(f, "none of the {requested} keys exist in the model")
            }
            PipelineError::Model(err) => write!(f, "model query failed: {err}"),
            PipelineError::Serialize(reason) => write!(f, "failed to write response: {reason}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Model(err) => Some(err),
            PipelineError::UnsupportedMediaType(_)
            | PipelineError::Parse(_)
            | PipelineError::NoResolvableKeys { .. }
            | PipelineError::Serialize(_) => None,
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(value: ModelError) -> Self {
        PipelineError::Model(value)
    }
}

impl From<AggregateError> for PipelineError {
    fn from(value: AggregateError) -> Self {
        match value {
            AggregateError::Empty { requested } => PipelineError::NoResolvableKeys { requested },
            AggregateError::Model(err) => PipelineError::Model(err),
        }
    }
}

impl PipelineError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedMediaType(_) => "unsupported_media_type",
            PipelineError::Parse(_) => "parse_error",
            PipelineError::NoResolvableKeys { .. } => "no_resolvable_keys",
            PipelineError::Model(ModelError::InvalidVector { .. }) => "invalid_vector",
            PipelineError::Model(_) => "model_error",
            PipelineError::Serialize(_) => "serialize_error",
        }
    }
}

/// Knobs for a single recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Recommendations returned per request, after the self-match is dropped.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Emit `key,score` rows instead of bare keys.
    #[serde(default)]
    pub include_scores: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            include_scores: false,
        }
    }
}

impl PipelineConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_scores(mut self, include_scores: bool) -> Self {
        self.include_scores = include_scores;
        self
    }
}

fn default_top_k() -> usize {
    5
}

/// Pipeline stages timed by [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Aggregate,
    Search,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Aggregate => "aggregate",
            Stage::Search => "search",
        }
    }
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_stage(&self, stage: Stage, latency: Duration, success: bool);
    fn record_lookups(&self, resolved: usize, skipped: usize);
    fn record_outcome(&self, result: Result<usize, &PipelineError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Option<Arc<dyn PipelineMetrics>>,
    stage: Stage,
    start: Instant,
}

impl MetricsSpan {
    fn start(recorder: &Option<Arc<dyn PipelineMetrics>>, stage: Stage) -> Self {
        Self {
            recorder: recorder.clone(),
            stage,
            start: Instant::now(),
        }
    }

    fn finish<T, E>(self, result: &Result<T, E>) {
        if let Some(recorder) = self.recorder {
            recorder.record_stage(self.stage, self.start.elapsed(), result.is_ok());
        }
    }
}

/// Outcome of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    /// Neighbors after the self-match was dropped, most similar first.
    pub items: Vec<Neighbor>,
    /// Rows in the inbound batch.
    pub requested: usize,
    pub resolved: usize,
    pub skipped: usize,
}

impl Recommendations {
    /// Header-less CSV body for the response.
    pub fn to_csv(&self, include_scores: bool) -> Result<String, PipelineError> {
        write_recommendations(&self.items, include_scores)
    }
}

/// Stateless request pipeline over a shared read-only table.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn EmbeddingModel>,
    config: PipelineConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("vectors", &self.model.len())
            .field("dimension", &self.model.dimension())
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    pub fn new(model: Arc<dyn EmbeddingModel>, config: PipelineConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn EmbeddingModel> {
        &self.model
    }

    /// Run one request end to end and return the CSV response body.
    ///
    /// The content type is checked before the body is read, so a non-CSV
    /// request never touches the table.
    pub fn invoke(&self, content_type: Option<&str>, body: &[u8]) -> Result<String, PipelineError> {
        let recorder = metrics_recorder();
        let result = self
            .handle(&recorder, content_type, body)
            .and_then(|recs| recs.to_csv(self.config.include_scores).map(|csv| (recs, csv)));

        if let Some(recorder) = &recorder {
            recorder.record_outcome(result.as_ref().map(|(recs, _)| recs.items.len()));
        }
        result.map(|(_, csv)| csv)
    }

    fn handle(
        &self,
        recorder: &Option<Arc<dyn PipelineMetrics>>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Recommendations, PipelineError> {
        if !is_csv(content_type) {
            return Err(PipelineError::UnsupportedMediaType(
                content_type.map(str::to_string),
            ));
        }

        let span = MetricsSpan::start(recorder, Stage::Parse);
        let parsed = parse_batch(body);
        span.finish(&parsed);
        let keys = parsed?;

        tracing::info!("Invoked with {} records", keys.len());

        self.recommend_with(recorder, &keys)
    }

    /// Recommend from raw (possibly zero-padded) keys, skipping the CSV layer.
    pub fn recommend<S: AsRef<str>>(&self, raw_keys: &[S]) -> Result<Recommendations, PipelineError> {
        self.recommend_with(&metrics_recorder(), raw_keys)
    }

    fn recommend_with<S: AsRef<str>>(
        &self,
        recorder: &Option<Arc<dyn PipelineMetrics>>,
        raw_keys: &[S],
    ) -> Result<Recommendations, PipelineError> {
        let keys: Vec<&str> = raw_keys.iter().map(|k| normalize_key(k.as_ref())).collect();

        let span = MetricsSpan::start(recorder, Stage::Aggregate);
        let aggregated = aggregate(self.model.as_ref(), keys.as_slice());
        span.finish(&aggregated);
        let Aggregate {
            vector,
            resolved,
            skipped,
        } = aggregated?;

        if let Some(recorder) = recorder {
            recorder.record_lookups(resolved, skipped);
        }
        tracing::debug!(resolved, skipped, "aggregated batch vector");

        let span = MetricsSpan::start(recorder, Stage::Search);
        let searched = self.model.nearest(&vector, self.config.top_k);
        span.finish(&searched);

        // The closest neighbor of the mean is treated as the query itself.
        let items: Vec<Neighbor> = searched?
            .into_iter()
            .skip(1)
            .take(self.config.top_k)
            .collect();

        Ok(Recommendations {
            items,
            requested: raw_keys.len(),
            resolved,
            skipped,
        })
    }
}
