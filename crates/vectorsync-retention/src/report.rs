use serde::{Deserialize, Serialize};

/// Outcome of one sweep. Deletion counts cover confirmed deletes only; in a
/// dry run they are what the sweep would have deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub collection: String,
    pub scanned: usize,
    pub deleted_by_ttl: usize,
    pub deleted_by_partition_cap: usize,
    pub deleted_by_global_cap: usize,
    /// Scanned points with no usable timestamp, treated as oldest.
    pub missing_timestamp: usize,
    pub errors: Vec<String>,
    pub dry_run: bool,
    pub duration_ms: u64,
}

impl RetentionReport {
    pub fn total_deleted(&self) -> usize {
        self.deleted_by_ttl + self.deleted_by_partition_cap + self.deleted_by_global_cap
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Running totals for a scheduler's lifetime. Individual reports are handed
/// out as each sweep finishes and not retained here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSummary {
    pub sweeps: usize,
    /// Sweeps that could not run at all, such as a failed scan.
    pub failed_sweeps: usize,
    /// Completed sweeps whose report carries errors.
    pub sweeps_with_errors: usize,
    pub total_deleted: usize,
    pub last: Option<RetentionReport>,
}

impl SchedulerSummary {
    pub(crate) fn record(&mut self, report: RetentionReport) {
        self.sweeps += 1;
        if report.has_errors() {
            self.sweeps_with_errors += 1;
        }
        self.total_deleted += report.total_deleted();
        self.last = Some(report);
    }

    pub fn has_errors(&self) -> bool {
        self.failed_sweeps > 0 || self.sweeps_with_errors > 0
    }
}
