//! Nearest-neighbor search over the embedding table.
//!
//! Search is an exact linear scan by default. With [`AnnConfig::enabled`] set
//! and at least [`AnnConfig::min_vectors_for_ann`] vectors, queries go through
//! a Hierarchical Navigable Small World graph (`hnsw_rs`) instead, trading
//! recall for sub-linear search. The approximate path can miss the true
//! closest vector, which the recommendation step relies on dropping.
//!
//! Distances are cosine distances (`1 - cosine similarity`), lower is closer.

use crate::error::ModelError;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for ANN index construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnConfig {
    /// Number of neighbors per node (higher = better recall, slower build).
    /// Default: 16
    pub m: usize,
    /// Size of dynamic candidate list during construction.
    /// Default: 200
    pub ef_construction: usize,
    /// Size of dynamic candidate list during search.
    /// Default: 50
    pub ef_search: usize,
    /// Upper bound on neighbors returned by a single search.
    /// Default: 100
    pub max_results: usize,
    /// Whether to use ANN or always fall back to linear scan.
    /// Default: false
    pub enabled: bool,
    /// Minimum number of vectors before ANN is used.
    /// Default: 1000
    pub min_vectors_for_ann: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            max_results: 100,
            enabled: false,
            min_vectors_for_ann: 1000,
        }
    }
}

impl AnnConfig {
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_vectors_for_ann(mut self, min: usize) -> Self {
        self.min_vectors_for_ann = min;
        self
    }

    /// Check if ANN should be used given the current table size.
    pub fn should_use_ann(&self, num_vectors: usize) -> bool {
        self.enabled && num_vectors >= self.min_vectors_for_ann
    }
}

/// Result from a nearest-neighbor search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnResult {
    /// Load position of the vector in the table.
    pub index: usize,
    /// Cosine distance to the query vector (lower = closer).
    pub distance: f32,
}

/// Key-addressed vector store with exact and HNSW search.
pub struct AnnIndex {
    config: AnnConfig,
    dimension: usize,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
    positions: HashMap<String, usize>,
    keys: Vec<String>,
    vectors: Vec<Vec<f32>>,
    built: bool,
}

impl AnnIndex {
    /// Create a new empty index.
    pub fn new(dimension: usize, config: AnnConfig) -> Self {
        Self {
            config,
            dimension,
            hnsw: None,
            positions: HashMap::new(),
            keys: Vec::new(),
            vectors: Vec::new(),
            built: false,
        }
    }

    /// Insert a vector under `key`. Keys are unique.
    pub fn insert(&mut self, key: String, vector: Vec<f32>) -> Result<(), ModelError> {
        let entry = self.vectors.len() + 1;
        if vector.len() != self.dimension {
            return Err(ModelError::InvalidVector {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        if self.positions.contains_key(&key) {
            return Err(ModelError::malformed(entry, format!("duplicate key {key:?}")));
        }

        let index = self.vectors.len();
        self.vectors.push(vector);
        self.positions.insert(key.clone(), index);
        self.keys.push(key);

        self.built = false;

        Ok(())
    }

    /// Search for the `k` nearest vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<AnnResult>, ModelError> {
        if query.len() != self.dimension {
            return Err(ModelError::InvalidVector {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let k = k.min(self.config.max_results);

        if self.built && self.uses_hnsw() {
            self.hnsw_search(query, k)
        } else {
            Ok(self.linear_search(query, k))
        }
    }

    fn hnsw_search(&self, query: &[f32], k: usize) -> Result<Vec<AnnResult>, ModelError> {
        let hnsw = self
            .hnsw
            .as_ref()
            .ok_or_else(|| ModelError::Ann("index not built".to_string()))?;
        let results: Vec<Neighbour> = hnsw.search(query, k, self.config.ef_search.max(k));

        Ok(results
            .into_iter()
            .map(|neighbour| AnnResult {
                index: neighbour.get_origin_id(),
                distance: neighbour.distance,
            })
            .collect())
    }

    /// Exact scan. Equal distances keep load order.
    fn linear_search(&self, query: &[f32], k: usize) -> Vec<AnnResult> {
        let mut distances: Vec<AnnResult> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vec)| AnnResult {
                index,
                distance: cosine_distance(query, vec),
            })
            .collect();

        distances.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        distances.truncate(k);
        distances
    }

    /// Key stored at a load position.
    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    /// Load position of a key.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Stored vector for a key.
    pub fn vector(&self, key: &str) -> Option<&[f32]> {
        self.position(key).map(|idx| self.vectors[idx].as_slice())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors in the index.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Whether queries are answered by the HNSW graph rather than the exact scan.
    pub fn uses_hnsw(&self) -> bool {
        self.hnsw.is_some() && self.config.should_use_ann(self.vectors.len())
    }

    /// Build the HNSW graph. Tables below `min_vectors_for_ann` (or under 10
    /// vectors, which HNSW handles poorly) are marked built and keep using
    /// the linear scan.
    pub fn build(&mut self) {
        if self.vectors.is_empty() {
            return;
        }

        let nb_elem = self.vectors.len();
        if nb_elem < 10 || !self.config.should_use_ann(nb_elem) {
            self.hnsw = None;
            self.built = true;
            return;
        }

        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);

        let hnsw = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            nb_elem,
            nb_layer,
            self.config.ef_construction,
            DistCosine {},
        );

        let data_for_insertion: Vec<(&Vec<f32>, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vec)| (vec, idx))
            .collect();
        hnsw.parallel_insert(&data_for_insertion);

        tracing::debug!(vectors = nb_elem, layers = nb_layer, "built hnsw graph");

        self.hnsw = Some(hnsw);
        self.built = true;
    }
}

/// Cosine distance (1 - cosine similarity). Zero vectors are maximally far.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = dot / (norm_a * norm_b);
    1.0 - similarity.clamp(-1.0, 1.0)
}
