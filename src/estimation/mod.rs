pub mod params;
pub mod estimator;
pub mod batch;
pub mod pipeline;

pub use params::{BudgetRange, EstimationDefaults, EstimationOverrides, EstimationParams, TierRanges};
pub use estimator::Estimator;
pub use batch::{BatchCoordinator, BatchOutcome, NoopSink, ProgressSink, DEFAULT_GROUP_SIZE};
pub use pipeline::{EstimationPipeline, RepoEstimate};
