use crate::ingest::{Event, RawValue, Reading};
use crate::processing::state::DegradationTracker;
use crate::telemetry::log::LogManager;

/// Readings that survived coercion, in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedBatch {
    pub readings: Vec<Reading>,
    pub rejected_value: usize,
    pub rejected_timestamp: usize,
    /// Whether the batch arrived out of timestamp order.
    pub reordered: bool,
}

impl SanitizedBatch {
    pub fn rejected(&self) -> usize {
        self.rejected_value + self.rejected_timestamp
    }
}

/// First stage: decodes untyped events and restores timestamp order.
pub struct Sanitizer {
    logger: LogManager,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("sanitizer"),
        }
    }

    pub fn sanitize(&self, events: &[Event], tracker: &mut DegradationTracker) -> SanitizedBatch {
        let mut batch = SanitizedBatch::default();
        batch.readings.reserve(events.len());

        for event in events {
            // A bad timestamp discards the whole event, value included.
            let Some(timestamp) = decode(&event.timestamp) else {
                batch.rejected_timestamp += 1;
                continue;
            };
            let Some(value) = decode(&event.value) else {
                batch.rejected_value += 1;
                continue;
            };
            batch
                .readings
                .push(Reading::new(value, timestamp).with_tag(event.tag.clone()));
        }

        batch.reordered = batch
            .readings
            .windows(2)
            .any(|pair| pair[1].timestamp < pair[0].timestamp);
        if batch.reordered {
            // stable: ties keep batch order
            batch
                .readings
                .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }

        tracker.note_rejections(batch.rejected());
        self.logger.trace_stage(&format!(
            "accepted {} rejected {} (value {}, timestamp {}){}",
            batch.readings.len(),
            batch.rejected(),
            batch.rejected_value,
            batch.rejected_timestamp,
            if batch.reordered { " reordered" } else { "" }
        ));
        batch
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort numeric decoding; anything non-finite is rejected.
pub fn decode(raw: &RawValue) -> Option<f64> {
    let value = match raw {
        RawValue::Number(value) => *value,
        RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
        RawValue::Missing | RawValue::Unsupported(_) => return None,
    };
    value.is_finite().then_some(value)
}
