use crate::workflow::runner::WorkflowResult;
use guardcore::telemetry::MetricsSnapshot;
use guardcore::Telemetry;
use serde::{Deserialize, Serialize};

/// Latest view served on `GET /telemetry`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardModel {
    pub values: Vec<f64>,
    pub emitted: usize,
    pub center: f64,
    pub spread: f64,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    pub telemetry: Telemetry,
    pub metrics: MetricsSnapshot,
}

impl DashboardModel {
    pub fn from_result(result: &WorkflowResult, metrics: MetricsSnapshot) -> Self {
        Self {
            values: result.values.clone(),
            emitted: result.emitted,
            center: result.center,
            spread: result.spread,
            buffer_len: result.buffer_len,
            buffer_capacity: result.buffer_capacity,
            telemetry: result.telemetry.clone(),
            metrics,
        }
    }
}
