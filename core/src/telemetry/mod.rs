pub mod log;
pub mod metrics;
pub mod report;

pub use log::LogManager;
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use report::{GuardSignal, Telemetry, TelemetryReport};
