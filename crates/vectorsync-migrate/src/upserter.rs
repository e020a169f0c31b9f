use std::sync::Arc;

use tracing::{debug, warn};
use vectorsync_common::{CancelToken, Error, Point, Result};
use vectorsync_index::{RetryError, RetryPolicy, VectorIndex};

/// Ordered points sent in one upsert call; the unit of partial failure.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertBatch {
    pub index: usize,
    pub points: Vec<Point>,
    pub first_source_id: String,
    pub last_source_id: String,
}

/// Sends batches to the index, retrying transient failures.
pub struct BatchUpserter {
    index: Arc<dyn VectorIndex>,
    collection: String,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl BatchUpserter {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        retry: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            index,
            collection: collection.into(),
            retry,
            cancel,
        }
    }

    /// Upsert one batch and return how many points it inserted.
    ///
    /// Errors are `Error::Upsert` for permanent failures or exhausted
    /// retries, and `Error::Cancelled` if the shared signal fired.
    pub async fn upsert(&self, batch: &UpsertBatch) -> Result<usize> {
        if batch.points.is_empty() {
            return Ok(0);
        }

        let label = format!("upsert batch {}", batch.index);
        let result = self
            .retry
            .run(&self.cancel, &label, || {
                self.index.upsert_points(&self.collection, &batch.points)
            })
            .await;

        match result {
            Ok(()) => {
                debug!(
                    "batch {} upserted {} points into '{}'",
                    batch.index,
                    batch.points.len(),
                    self.collection
                );
                Ok(batch.points.len())
            }
            Err(RetryError::Failed { error, attempts }) => {
                warn!(
                    "batch {} failed after {attempts} attempt(s): {error}",
                    batch.index
                );
                Err(Error::Upsert { error, attempts })
            }
            Err(RetryError::Cancelled) => Err(Error::Cancelled),
        }
    }
}
