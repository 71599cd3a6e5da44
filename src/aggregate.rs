//! Mean pooling of looked-up vectors.

use model::{EmbeddingModel, ModelError};

/// Mean of the vectors resolved for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub vector: Vec<f32>,
    /// Keys that resolved and contributed to the mean.
    pub resolved: usize,
    /// Keys skipped because the table has no entry for them.
    pub skipped: usize,
}

/// Errors from [`aggregate`].
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Every key missed the table, so there is nothing to average.
    #[error("none of the {requested} keys resolved to a vector")]
    Empty { requested: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Average the vectors for `keys`, skipping keys the table does not contain.
///
/// Order only decides membership; every resolved key has equal weight and
/// repeated keys count once per occurrence.
pub fn aggregate<M, S>(model: &M, keys: &[S]) -> Result<Aggregate, AggregateError>
where
    M: EmbeddingModel + ?Sized,
    S: AsRef<str>,
{
    let dimension = model.dimension();
    let mut sum = vec![0f64; dimension];
    let mut resolved = 0usize;
    let mut skipped = 0usize;

    for key in keys {
        let key = key.as_ref();
        match model.vector_of(key) {
            Ok(vector) => {
                if vector.len() != dimension {
                    return Err(ModelError::InvalidVector {
                        expected: dimension,
                        got: vector.len(),
                    }
                    .into());
                }
                for (acc, value) in sum.iter_mut().zip(vector) {
                    *acc += f64::from(*value);
                }
                resolved += 1;
            }
            Err(ModelError::KeyNotFound(_)) => {
                tracing::debug!(key, "skipping key missing from model");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if resolved == 0 {
        return Err(AggregateError::Empty {
            requested: keys.len(),
        });
    }

    let n = resolved as f64;
    Ok(Aggregate {
        vector: sum.into_iter().map(|acc| (acc / n) as f32).collect(),
        resolved,
        skipped,
    })
}
