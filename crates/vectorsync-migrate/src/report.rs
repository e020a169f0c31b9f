use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Result of one live migration run. Built once by the coordinator and
/// handed to the caller; it is the only record of what succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub collection: String,
    pub total_read: usize,
    pub total_inserted: usize,
    /// Ordered by batch index, regardless of completion order.
    pub failed_batches: Vec<FailedBatch>,
    pub skipped_records: Vec<SkippedRecord>,
    pub identity_collisions: usize,
    /// Birthday-bound collision estimate, present for very large runs.
    pub collision_probability: Option<f64>,
    pub cancelled: bool,
    /// Set when a fatal error stopped the pass; counts cover work done before it.
    pub aborted: Option<String>,
    pub duration_ms: u64,
}

impl MigrationReport {
    /// Any failed batch, skipped record, cancellation or abort makes the run a failure.
    pub fn has_failures(&self) -> bool {
        !self.failed_batches.is_empty()
            || !self.skipped_records.is_empty()
            || self.cancelled
            || self.aborted.is_some()
    }

    pub fn failed_batch_indexes(&self) -> Vec<usize> {
        self.failed_batches.iter().map(|b| b.batch_index).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch_index: usize,
    pub size: usize,
    /// First and last source ids in the batch, for manual retries.
    pub first_source_id: String,
    pub last_source_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub source_id: String,
    pub reason: String,
}

/// What a dry run would migrate. No index calls are made to build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunPreview {
    pub collection: String,
    pub total_records: usize,
    pub samples: Vec<PreviewEntry>,
    pub skipped_records: Vec<SkippedRecord>,
    pub identity_collisions: usize,
    /// The pass was interrupted; totals cover only what was read.
    pub cancelled: bool,
}

impl DryRunPreview {
    pub fn has_failures(&self) -> bool {
        !self.skipped_records.is_empty() || self.cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub source_id: String,
    pub point_id: u64,
    pub vector_dim: usize,
    pub path: String,
}

/// Append-only collector shared by in-flight batches.
#[derive(Debug, Default)]
pub(crate) struct ReportAccumulator {
    inner: Mutex<Tally>,
}

#[derive(Debug, Default)]
struct Tally {
    total_read: usize,
    total_inserted: usize,
    failed_batches: Vec<FailedBatch>,
    skipped_records: Vec<SkippedRecord>,
    cancelled: bool,
}

impl ReportAccumulator {
    fn with_tally<R>(&self, f: impl FnOnce(&mut Tally) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub(crate) fn record_read(&self) {
        self.with_tally(|t| t.total_read += 1);
    }

    pub(crate) fn record_skipped(&self, source_id: String, reason: String) {
        self.with_tally(|t| t.skipped_records.push(SkippedRecord { source_id, reason }));
    }

    pub(crate) fn record_inserted(&self, count: usize) {
        self.with_tally(|t| t.total_inserted += count);
    }

    pub(crate) fn record_failed(&self, failed: FailedBatch) {
        self.with_tally(|t| t.failed_batches.push(failed));
    }

    pub(crate) fn mark_cancelled(&self) {
        self.with_tally(|t| t.cancelled = true);
    }

    pub(crate) fn finish(
        self,
        collection: String,
        identity_collisions: usize,
        collision_probability: Option<f64>,
        duration: Duration,
    ) -> MigrationReport {
        let mut tally = self.inner.into_inner().unwrap_or_else(|e| e.into_inner());
        tally.failed_batches.sort_by_key(|b| b.batch_index);

        MigrationReport {
            collection,
            total_read: tally.total_read,
            total_inserted: tally.total_inserted,
            failed_batches: tally.failed_batches,
            skipped_records: tally.skipped_records,
            identity_collisions,
            collision_probability,
            cancelled: tally.cancelled,
            aborted: None,
            duration_ms: duration.as_millis() as u64,
        }
    }
}
