//! # embedrec model
//!
//! Read-only embedding table used by the recommendation pipeline.
//!
//! The pipeline never talks to a concrete table. It is handed an
//! [`EmbeddingModel`], which exposes exactly two queries:
//!
//! - [`EmbeddingModel::vector_of`]: key lookup, failing with
//!   [`ModelError::KeyNotFound`] on a miss.
//! - [`EmbeddingModel::nearest`]: cosine nearest neighbors of an arbitrary
//!   vector, returning up to `k + 1` hits so the caller can drop the
//!   self-match.
//!
//! [`KeyedVectors`] is the production implementation. It reads word2vec text
//! or binary artifacts, optionally L2-normalizes every vector, and answers
//! `nearest` with an exact scan for small tables or an HNSW graph for large
//! ones (see [`ann`]).
//!
//! ```
//! use model::{AnnConfig, EmbeddingModel, KeyedVectors};
//!
//! let table = KeyedVectors::from_entries(
//!     2,
//!     vec![("1", vec![1.0, 0.0]), ("2", vec![0.0, 1.0]), ("3", vec![1.0, 1.0])],
//!     true,
//!     AnnConfig::default(),
//! )
//! .unwrap();
//!
//! let hits = table.nearest(&[0.5, 0.5], 5).unwrap();
//! assert_eq!(hits[0].key, "3");
//! ```

pub mod ann;
mod config;
mod error;
pub mod format;
mod keyed;

pub use ann::AnnConfig;
pub use config::{ModelConfig, ModelFormat};
pub use error::ModelError;
pub use keyed::KeyedVectors;

use serde::Serialize;

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub key: String,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

/// Read-only embedding lookup and similarity search.
///
/// Implementations are immutable once constructed and shared across request
/// threads behind an `Arc`.
pub trait EmbeddingModel: Send + Sync {
    /// Length of every vector in the table.
    fn dimension(&self) -> usize;

    /// Number of keys in the table.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector stored under `key`.
    fn vector_of(&self, key: &str) -> Result<&[f32], ModelError>;

    /// Up to `k + 1` neighbors of `vector`, most similar first.
    fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, ModelError>;
}
