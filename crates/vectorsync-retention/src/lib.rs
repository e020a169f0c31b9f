pub mod engine;
pub mod point;
pub mod policy;
pub mod report;
pub mod scheduler;

pub use engine::RetentionEngine;
pub use point::{PayloadFields, RetainedPoint};
pub use policy::{DeletionPlan, RetentionPolicy, plan};
pub use report::{RetentionReport, SchedulerSummary};
pub use scheduler::RetentionScheduler;
