use vectorsync_common::{EmbeddingRecord, Result};

/// Lazy pass over the source records.
///
/// Items are `Err(Error::RecordCorrupt { .. })` for rows whose vector could
/// not be decoded; callers skip those and keep going. Any other error ends
/// the pass.
pub type RecordStream = Box<dyn Iterator<Item = Result<EmbeddingRecord>> + Send>;

/// A finite, restartable set of embedding records.
pub trait EmbeddingSource: Send + Sync {
    /// Open an independent pass over every record, in insertion order.
    fn read(&self) -> Result<RecordStream>;
}

impl EmbeddingSource for Vec<EmbeddingRecord> {
    fn read(&self) -> Result<RecordStream> {
        Ok(Box::new(self.clone().into_iter().map(Ok)))
    }
}
