pub mod coordinator;
pub mod identity;
pub mod report;
pub mod upserter;

pub use coordinator::{MigrationCoordinator, MigrationOptions, MigrationOutcome, MigrationState};
pub use identity::{CollisionTracker, Identity, IdentityMapper, Observation};
pub use report::{DryRunPreview, FailedBatch, MigrationReport, PreviewEntry, SkippedRecord};
pub use upserter::{BatchUpserter, UpsertBatch};
