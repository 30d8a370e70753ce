pub mod history;
pub mod outlier_guard;
pub mod processor;
pub mod resource_guardian;
pub mod robust_stats;
pub mod sanitizer;
pub mod state;

pub use history::HistoryBuffer;
pub use outlier_guard::{GuardDecision, OutlierGuard};
pub use processor::{BatchOutcome, BatchProcessor};
pub use resource_guardian::{ResourceGuardian, ResourceVerdict};
pub use robust_stats::{RobustAccumulator, RobustStatsEngine};
pub use sanitizer::{SanitizedBatch, Sanitizer};
pub use state::{DegradationTracker, PipelineState};
