use crate::ann::{AnnConfig, AnnIndex};
use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::format::{read_table, RawTable};
use crate::{EmbeddingModel, Neighbor};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::time::Instant;

/// Immutable key → vector table loaded from a word2vec artifact.
pub struct KeyedVectors {
    index: AnnIndex,
}

impl KeyedVectors {
    /// Load the artifact described by `config`.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let path = config.model_path();
        let format = config.format.resolve(&path);
        let started = Instant::now();

        let file = File::open(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ModelError::NotFound(path.display().to_string()),
            _ => ModelError::Io(err),
        })?;
        let raw = read_table(BufReader::new(file), format)?;
        let table = Self::from_raw(raw, config.normalize, config.ann)?;

        tracing::info!(
            path = %path.display(),
            format = ?format,
            vectors = table.len(),
            dimension = table.dimension(),
            search = if table.is_approximate() { "hnsw" } else { "exact" },
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(table)
    }

    /// Build a table from in-memory entries, in order.
    pub fn from_entries<I, K>(
        dimension: usize,
        entries: I,
        normalize: bool,
        ann: AnnConfig,
    ) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (K, Vec<f32>)>,
        K: Into<String>,
    {
        let raw = RawTable {
            dimension,
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        Self::from_raw(raw, normalize, ann)
    }

    fn from_raw(raw: RawTable, normalize: bool, ann: AnnConfig) -> Result<Self, ModelError> {
        if raw.entries.is_empty() {
            return Err(ModelError::Empty);
        }

        let mut index = AnnIndex::new(raw.dimension, ann);
        for (key, mut vector) in raw.entries {
            if normalize {
                unit_normalize(&mut vector);
            }
            index.insert(key, vector)?;
        }
        index.build();

        Ok(Self { index })
    }

    /// Whether `nearest` goes through the HNSW graph instead of an exact scan.
    pub fn is_approximate(&self) -> bool {
        self.index.uses_hnsw()
    }
}

impl EmbeddingModel for KeyedVectors {
    fn dimension(&self) -> usize {
        self.index.dimension()
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn vector_of(&self, key: &str) -> Result<&[f32], ModelError> {
        self.index
            .vector(key)
            .ok_or_else(|| ModelError::KeyNotFound(key.to_string()))
    }

    fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, ModelError> {
        if k == 0 {
            return Err(ModelError::InvalidK(k));
        }

        let hits = self.index.search(vector, k + 1)?;
        hits.into_iter()
            .map(|hit| {
                let key = self
                    .index
                    .key(hit.index)
                    .ok_or_else(|| ModelError::Ann(format!("unknown position {}", hit.index)))?;
                Ok(Neighbor {
                    key: key.to_string(),
                    score: 1.0 - hit.distance,
                })
            })
            .collect()
    }
}

/// Scale to unit L2 norm in place. Zero vectors are left untouched.
fn unit_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
