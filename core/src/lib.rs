//! Telemetry-preprocessing core for the guarded sensor pipeline.
//!
//! Each call to [`BatchProcessor::process_batch`] sanitizes a raw batch,
//! refreshes robust location/scale estimates, filters outliers without
//! erasing minority modes, and commits survivors to a bounded history held
//! in a caller-owned [`PipelineState`].

pub mod ingest;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use ingest::{Event, RawValue, Reading};
pub use prelude::{CenterEstimator, GuardConfig, GuardError, GuardResult};
pub use processing::{BatchOutcome, BatchProcessor, PipelineState};
pub use telemetry::{GuardSignal, Telemetry, TelemetryReport};
