use std::io;
use thiserror::Error;

/// Errors surfaced while loading or querying an embedding table.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model artifact does not exist at the configured location.
    #[error("model file not found: {0}")]
    NotFound(String),
    /// Low-level IO failures while reading the artifact.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The artifact was readable but its contents are not a valid table.
    #[error("malformed model file at entry {entry}: {reason}")]
    Malformed { entry: usize, reason: String },
    /// The artifact parsed but holds zero vectors.
    #[error("model file contains no vectors")]
    Empty,
    /// Single key lookup miss. Callers that aggregate treat this as recoverable.
    #[error("key not found: {0}")]
    KeyNotFound(String),
    /// Query vector does not match the table's dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    InvalidVector { expected: usize, got: usize },
    /// Neighbor count must be at least one.
    #[error("invalid neighbor count: {0}")]
    InvalidK(usize),
    /// HNSW construction or search failure.
    #[error("ann error: {0}")]
    Ann(String),
}

impl ModelError {
    pub(crate) fn malformed(entry: usize, reason: impl Into<String>) -> Self {
        ModelError::Malformed {
            entry,
            reason: reason.into(),
        }
    }

    /// True for the failures that can only occur while reading an artifact.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ModelError::NotFound(_)
                | ModelError::Io(_)
                | ModelError::Malformed { .. }
                | ModelError::Empty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_not_found() {
        let err = ModelError::NotFound("/opt/ml/model/word2vec_2.model".into());
        assert!(err.to_string().contains("model file not found"));
        assert!(err.to_string().contains("word2vec_2.model"));
        assert!(err.is_load_error());
    }

    #[test]
    fn error_malformed() {
        let err = ModelError::malformed(3, "expected 2 components, got 1");
        assert!(err.to_string().contains("entry 3"));
        assert!(err.to_string().contains("expected 2 components"));
        assert!(err.is_load_error());
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "truncated");
        let err: ModelError = io_err.into();
        assert!(err.to_string().contains("io error"));
        assert!(err.is_load_error());
    }

    #[test]
    fn query_errors_are_not_load_errors() {
        assert!(!ModelError::KeyNotFound("42".into()).is_load_error());
        assert!(!ModelError::InvalidVector {
            expected: 3,
            got: 2
        }
        .is_load_error());
        assert!(!ModelError::InvalidK(0).is_load_error());
    }

    #[test]
    fn invalid_vector_message() {
        let err = ModelError::InvalidVector {
            expected: 100,
            got: 3,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 100, got 3");
    }
}
