use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vectorsync_common::{CancelToken, EmbeddingRecord, Error, Point, PointId, PointPayload, Result};
use vectorsync_config::AppConfig;
use vectorsync_db::{EmbeddingSource, RecordStream};
use vectorsync_index::{Distance, RetryError, RetryPolicy, VectorIndex};

use crate::identity::{COLLISION_REPORT_THRESHOLD, CollisionTracker, IdentityMapper, Observation};
use crate::report::{
    DryRunPreview, FailedBatch, MigrationReport, PreviewEntry, ReportAccumulator, SkippedRecord,
};
use crate::upserter::{BatchUpserter, UpsertBatch};

const PREVIEW_ID_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    Reading,
    DryRunReport,
    Migrating,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub collection: String,
    pub vector_dim: usize,
    pub batch_size: usize,
    pub concurrency: usize,
    pub preview_size: usize,
    pub dry_run: bool,
}

impl MigrationOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            collection: config.index.collection.clone(),
            vector_dim: config.migration.vector_dim,
            batch_size: config.migration.batch_size,
            concurrency: config.migration.concurrency,
            preview_size: config.migration.preview_size,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    DryRun(DryRunPreview),
    Completed(MigrationReport),
}

impl MigrationOutcome {
    pub fn has_failures(&self) -> bool {
        match self {
            Self::DryRun(preview) => preview.has_failures(),
            Self::Completed(report) => report.has_failures(),
        }
    }
}

/// Drives one migration: source pass, identity mapping, batched upserts.
pub struct MigrationCoordinator {
    index: Arc<dyn VectorIndex>,
    options: MigrationOptions,
    retry: RetryPolicy,
    cancel: CancelToken,
    state: MigrationState,
}

impl MigrationCoordinator {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        options: MigrationOptions,
        retry: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            index,
            options,
            retry,
            cancel,
            state: MigrationState::Idle,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    fn transition(&mut self, next: MigrationState) {
        debug!("migration state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn run(&mut self, source: &dyn EmbeddingSource) -> Result<MigrationOutcome> {
        if self.options.batch_size == 0 || self.options.concurrency == 0 {
            return Err(Error::Config(
                "batch_size and concurrency must be greater than zero".into(),
            ));
        }

        info!(
            "starting migration into '{}' (dim {}, batch size {}, concurrency {}, dry run {})",
            self.options.collection,
            self.options.vector_dim,
            self.options.batch_size,
            self.options.concurrency,
            self.options.dry_run
        );

        if self.options.dry_run {
            self.transition(MigrationState::Reading);
            let preview = self.preview(source.read()?).await?;
            self.transition(MigrationState::DryRunReport);
            info!(
                "dry run: would migrate {} records ({} skipped)",
                preview.total_records,
                preview.skipped_records.len()
            );
            self.transition(MigrationState::Completed);
            return Ok(MigrationOutcome::DryRun(preview));
        }

        let started = Instant::now();
        let records = source.read()?;
        self.ensure_collection().await?;

        self.transition(MigrationState::Reading);
        let report = self.migrate(records, started).await;
        self.transition(MigrationState::Completed);

        info!(
            "migration finished: read {}, inserted {}, {} failed batches, {} skipped records in {}ms",
            report.total_read,
            report.total_inserted,
            report.failed_batches.len(),
            report.skipped_records.len(),
            report.duration_ms
        );
        Ok(MigrationOutcome::Completed(report))
    }

    async fn preview(&self, records: RecordStream) -> Result<DryRunPreview> {
        let mut tracker = CollisionTracker::default();
        let mut preview = DryRunPreview {
            collection: self.options.collection.clone(),
            total_records: 0,
            samples: Vec::new(),
            skipped_records: Vec::new(),
            identity_collisions: 0,
            cancelled: false,
        };

        let mut items = spawn_reader(records, self.options.batch_size);
        while let Some(item) = items.recv().await {
            if self.cancel.is_cancelled() {
                warn!("dry run cancelled after {} records", preview.total_records);
                preview.cancelled = true;
                break;
            }

            let Some(record) = self.accept(item, |source_id, reason| {
                preview
                    .skipped_records
                    .push(SkippedRecord { source_id, reason })
            })?
            else {
                continue;
            };

            let identity = IdentityMapper::identity(&record.source_id);
            tracker.observe(identity);
            preview.total_records += 1;

            if preview.samples.len() < self.options.preview_size {
                preview.samples.push(PreviewEntry {
                    source_id: record.source_id.chars().take(PREVIEW_ID_CHARS).collect(),
                    point_id: identity.id,
                    vector_dim: record.vector.len(),
                    path: record.path,
                });
            }
        }

        preview.identity_collisions = tracker.collisions();
        Ok(preview)
    }

    /// Validate one source item. Corrupt records go to `on_skip` and yield
    /// `None`; a dimension mismatch or a store error ends the run.
    fn accept(
        &self,
        item: Result<EmbeddingRecord>,
        on_skip: impl FnOnce(String, String),
    ) -> Result<Option<EmbeddingRecord>> {
        let record = match item {
            Ok(record) => record,
            Err(Error::RecordCorrupt { source_id, reason }) => {
                warn!("skipping corrupt record {source_id}: {reason}");
                on_skip(source_id, reason);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if record.vector.len() != self.options.vector_dim {
            return Err(Error::DimensionMismatch {
                source_id: record.source_id,
                expected: self.options.vector_dim,
                actual: record.vector.len(),
            });
        }

        Ok(Some(record))
    }

    /// Make sure the target collection exists with the configured dimension.
    async fn ensure_collection(&self) -> Result<()> {
        let collection = self.options.collection.as_str();
        let info = self
            .retry
            .run(&self.cancel, "collection lookup", || {
                self.index.collection_info(collection)
            })
            .await
            .map_err(|e| collection_error(collection, e))?;

        match info {
            Some(info) => {
                if let Some(dim) = info.vector_dim
                    && dim != self.options.vector_dim
                {
                    return Err(Error::CollectionUnavailable(format!(
                        "collection '{collection}' has dimension {dim}, expected {}",
                        self.options.vector_dim
                    )));
                }
                info!(
                    "collection '{collection}' exists with {} points",
                    info.point_count
                );
                Ok(())
            }
            None => {
                self.retry
                    .run(&self.cancel, "create collection", || {
                        self.index.create_collection(
                            collection,
                            self.options.vector_dim,
                            Distance::Cosine,
                        )
                    })
                    .await
                    .map_err(|e| collection_error(collection, e))?;
                info!("created collection '{collection}'");
                Ok(())
            }
        }
    }

    /// Stream records into batches. A fatal error stops the pass but still
    /// yields the report for what was written, with `aborted` set.
    async fn migrate(&mut self, records: RecordStream, started: Instant) -> MigrationReport {
        let upserter = BatchUpserter::new(
            Arc::clone(&self.index),
            self.options.collection.clone(),
            self.retry.clone(),
            self.cancel.clone(),
        );
        let accumulator = ReportAccumulator::default();
        let mut tracker = CollisionTracker::default();
        let mut in_flight = FuturesUnordered::new();
        let mut pending: Vec<EmbeddingRecord> = Vec::with_capacity(self.options.batch_size);
        let mut next_index = 0usize;
        let mut total_read = 0u64;
        let mut fatal = None;

        let capacity = self.options.batch_size.saturating_mul(self.options.concurrency);
        let mut items = spawn_reader(records, capacity);
        while let Some(item) = items.recv().await {
            if self.cancel.is_cancelled() {
                accumulator.mark_cancelled();
                break;
            }

            let record = match self.accept(item, |source_id, reason| {
                accumulator.record_skipped(source_id, reason)
            }) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            };

            accumulator.record_read();
            total_read += 1;
            pending.push(record);

            if pending.len() == self.options.batch_size {
                if next_index == 0 {
                    self.transition(MigrationState::Migrating);
                }
                let batch = build_batch(next_index, std::mem::take(&mut pending), &mut tracker);
                next_index += 1;
                in_flight.push(submit(&upserter, batch, &accumulator));

                while in_flight.len() >= self.options.concurrency {
                    in_flight.next().await;
                }
            }
        }

        if fatal.is_none() && !pending.is_empty() && !self.cancel.is_cancelled() {
            self.transition(MigrationState::Migrating);
            let batch = build_batch(next_index, pending, &mut tracker);
            in_flight.push(submit(&upserter, batch, &accumulator));
        }

        drop(items);
        while in_flight.next().await.is_some() {}
        drop(in_flight);

        let collision_probability = (total_read >= COLLISION_REPORT_THRESHOLD)
            .then(|| IdentityMapper::collision_probability(total_read));
        if let Some(p) = collision_probability {
            warn!("{total_read} records read; estimated identity collision probability {p:.6}");
        }

        let mut report = accumulator.finish(
            self.options.collection.clone(),
            tracker.collisions(),
            collision_probability,
            started.elapsed(),
        );
        if let Some(e) = fatal {
            error!(
                "migration aborted after {} batches ({} points inserted): {e}",
                next_index, report.total_inserted
            );
            report.aborted = Some(e.to_string());
        }
        report
    }
}

/// Drain a blocking record stream on the blocking pool and hand items over
/// a bounded channel. The reader stops once the receiver is dropped.
fn spawn_reader(records: RecordStream, capacity: usize) -> mpsc::Receiver<Result<EmbeddingRecord>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || {
        for item in records {
            if tx.blocking_send(item).is_err() {
                debug!("record reader stopped early");
                break;
            }
        }
    });
    rx
}

fn collection_error(collection: &str, error: RetryError) -> Error {
    match error {
        RetryError::Cancelled => Error::Cancelled,
        RetryError::Failed { error, .. } => {
            Error::CollectionUnavailable(format!("collection '{collection}': {error}"))
        }
    }
}

fn build_batch(
    index: usize,
    records: Vec<EmbeddingRecord>,
    tracker: &mut CollisionTracker,
) -> UpsertBatch {
    let first_source_id = records
        .first()
        .map(|r| r.source_id.clone())
        .unwrap_or_default();
    let last_source_id = records
        .last()
        .map(|r| r.source_id.clone())
        .unwrap_or_default();

    let points = records
        .into_iter()
        .map(|record| {
            let identity = IdentityMapper::identity(&record.source_id);
            if tracker.observe(identity) == Observation::Collision {
                warn!(
                    "source id {} collides with an earlier record on point {}",
                    record.source_id, identity.id
                );
            }
            Point {
                id: PointId::Num(identity.id),
                vector: record.vector,
                payload: PointPayload {
                    text: record.text,
                    path: record.path,
                },
            }
        })
        .collect();

    UpsertBatch {
        index,
        points,
        first_source_id,
        last_source_id,
    }
}

async fn submit(upserter: &BatchUpserter, batch: UpsertBatch, accumulator: &ReportAccumulator) {
    match upserter.upsert(&batch).await {
        Ok(inserted) => accumulator.record_inserted(inserted),
        Err(e) => {
            if matches!(e, Error::Cancelled) {
                accumulator.mark_cancelled();
            }
            accumulator.record_failed(FailedBatch {
                batch_index: batch.index,
                size: batch.points.len(),
                first_source_id: batch.first_source_id,
                last_source_id: batch.last_source_id,
                reason: e.to_string(),
            });
        }
    }
}
