use serde::{Deserialize, Serialize};

/// Sanitized reading: finite value, finite timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Reading {
    pub fn new(value: f64, timestamp: f64) -> Self {
        Self {
            value,
            timestamp,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }
}
