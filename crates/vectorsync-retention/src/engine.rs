use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vectorsync_common::{CancelToken, Error, PointId, Result};
use vectorsync_config::AppConfig;
use vectorsync_index::{RetryError, RetryPolicy, VectorIndex};

use crate::point::{PayloadFields, RetainedPoint};
use crate::policy::{DeletionPlan, RetentionPolicy, plan};
use crate::report::RetentionReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Ttl,
    PartitionCap,
    GlobalCap,
}

impl Rule {
    fn label(self) -> &'static str {
        match self {
            Self::Ttl => "ttl",
            Self::PartitionCap => "partition cap",
            Self::GlobalCap => "global cap",
        }
    }
}

/// Applies a [`RetentionPolicy`] to one collection.
pub struct RetentionEngine {
    index: Arc<dyn VectorIndex>,
    collection: String,
    policy: RetentionPolicy,
    fields: PayloadFields,
    retry: RetryPolicy,
    cancel: CancelToken,
    scan_page_size: usize,
    delete_batch_size: usize,
}

impl RetentionEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            index,
            collection: collection.into(),
            policy,
            fields: PayloadFields::default(),
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
            scan_page_size: 256,
            delete_batch_size: 256,
        }
    }

    pub fn from_config(index: Arc<dyn VectorIndex>, config: &AppConfig) -> Self {
        Self::new(
            index,
            config.index.collection.clone(),
            RetentionPolicy::from(&config.retention),
        )
        .with_fields(PayloadFields::from(&config.retention))
        .with_retry(RetryPolicy::from(&config.retry))
        .with_page_sizes(
            config.retention.scan_page_size,
            config.retention.delete_batch_size,
        )
    }

    pub fn with_fields(mut self, fields: PayloadFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_page_sizes(mut self, scan: usize, delete: usize) -> Self {
        self.scan_page_size = scan.max(1);
        self.delete_batch_size = delete.max(1);
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Read every point's retention metadata from the collection.
    pub async fn scan(&self) -> Result<Vec<RetainedPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let page = self
                .retry
                .run(&self.cancel, "retention scan", || {
                    self.index
                        .scroll_points(&self.collection, self.scan_page_size, offset.clone())
                })
                .await
                .map_err(|e| match e {
                    RetryError::Cancelled => Error::Cancelled,
                    RetryError::Failed { error, .. } => Error::Index(error),
                })?;

            debug!(
                "scanned {} points from '{}' (next offset {:?})",
                page.points.len(),
                self.collection,
                page.next_offset
            );
            points.extend(
                page.points
                    .into_iter()
                    .map(|p| RetainedPoint::from_payload(p, &self.fields)),
            );

            match page.next_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(points)
    }

    /// Deletion set for `points` at `now`; touches nothing.
    pub fn plan(&self, points: &[RetainedPoint], now: DateTime<Utc>) -> DeletionPlan {
        plan(points, &self.policy, now)
    }

    /// Run one sweep. Scan failures abort the sweep with an error; failed
    /// delete batches are recorded in the report and the sweep continues.
    pub async fn sweep(&self, dry_run: bool) -> Result<RetentionReport> {
        let started = Instant::now();
        let mut report = RetentionReport {
            collection: self.collection.clone(),
            dry_run,
            ..RetentionReport::default()
        };

        if self.policy.is_empty() {
            info!("no retention rules configured for '{}', nothing to do", self.collection);
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let points = self.scan().await?;
        report.scanned = points.len();

        let deletions = self.plan(&points, Utc::now());
        report.missing_timestamp = deletions.missing_timestamp;
        if deletions.missing_timestamp > 0 {
            warn!(
                "{} points in '{}' have no '{}' field and are treated as oldest",
                deletions.missing_timestamp, self.collection, self.fields.timestamp
            );
        }

        if dry_run {
            report.deleted_by_ttl = deletions.by_ttl.len();
            report.deleted_by_partition_cap = deletions.by_partition_cap.len();
            report.deleted_by_global_cap = deletions.by_global_cap.len();
        } else if !deletions.is_empty() {
            for (rule, ids) in [
                (Rule::Ttl, &deletions.by_ttl),
                (Rule::PartitionCap, &deletions.by_partition_cap),
                (Rule::GlobalCap, &deletions.by_global_cap),
            ] {
                let deleted = self.delete(rule, ids, &mut report.errors).await;
                match rule {
                    Rule::Ttl => report.deleted_by_ttl = deleted,
                    Rule::PartitionCap => report.deleted_by_partition_cap = deleted,
                    Rule::GlobalCap => report.deleted_by_global_cap = deleted,
                }
                if self.cancel.is_cancelled() {
                    break;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "retention sweep of '{}': scanned {}, {} {} by ttl, {} by partition cap, {} by global cap, {} errors",
            self.collection,
            report.scanned,
            if dry_run { "would delete" } else { "deleted" },
            report.deleted_by_ttl,
            report.deleted_by_partition_cap,
            report.deleted_by_global_cap,
            report.errors.len()
        );
        Ok(report)
    }

    async fn delete(&self, rule: Rule, ids: &[PointId], errors: &mut Vec<String>) -> usize {
        let mut deleted = 0;
        for (n, chunk) in ids.chunks(self.delete_batch_size).enumerate() {
            let label = format!("{} delete batch {n}", rule.label());
            let result = self
                .retry
                .run(&self.cancel, &label, || {
                    self.index.delete_points(&self.collection, chunk)
                })
                .await;

            match result {
                Ok(()) => {
                    debug!("{label}: deleted {} points", chunk.len());
                    deleted += chunk.len();
                }
                Err(RetryError::Cancelled) => {
                    errors.push(format!("{label}: cancelled"));
                    break;
                }
                Err(RetryError::Failed { error, attempts }) => {
                    let error = Error::Delete { error, attempts };
                    warn!("{label} failed after {attempts} attempt(s): {error}");
                    errors.push(format!("{label} ({} points): {error}", chunk.len()));
                }
            }
        }
        deleted
    }
}
