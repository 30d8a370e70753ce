use crate::ingest::Reading;
use crate::prelude::GuardError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity history of retained readings. Oldest entries are evicted
/// before a push would exceed the capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HistorySnapshot", into = "HistorySnapshot")]
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

/// Wire form of [`HistoryBuffer`]; decoding re-checks the capacity bound.
#[derive(Serialize, Deserialize)]
pub struct HistorySnapshot {
    capacity: usize,
    readings: Vec<Reading>,
}

impl HistoryBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a reading, returning the evicted oldest entry when full.
    pub fn push(&mut self, reading: Reading) -> Option<Reading> {
        let evicted = if self.readings.len() >= self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(reading);
        evicted
    }

    /// Pushes every reading and returns how many entries were evicted.
    pub fn extend_bounded<I>(&mut self, readings: I) -> usize
    where
        I: IntoIterator<Item = Reading>,
    {
        readings
            .into_iter()
            .filter_map(|reading| self.push(reading))
            .count()
    }

    /// Shrinks or grows the capacity, evicting oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        let overflow = self.readings.len().saturating_sub(self.capacity);
        self.readings.drain(..overflow);
        overflow
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// The `count` most recent readings, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Reading> {
        self.readings
            .iter()
            .skip(self.readings.len().saturating_sub(count))
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }
}

impl TryFrom<HistorySnapshot> for HistoryBuffer {
    type Error = GuardError;

    fn try_from(snapshot: HistorySnapshot) -> Result<Self, Self::Error> {
        if snapshot.capacity == 0 || snapshot.readings.len() > snapshot.capacity {
            return Err(GuardError::StateCapacity {
                len: snapshot.readings.len(),
                capacity: snapshot.capacity,
            });
        }
        Ok(Self {
            readings: snapshot.readings.into(),
            capacity: snapshot.capacity,
        })
    }
}

impl From<HistoryBuffer> for HistorySnapshot {
    fn from(buffer: HistoryBuffer) -> Self {
        Self {
            capacity: buffer.capacity,
            readings: buffer.readings.into(),
        }
    }
}
