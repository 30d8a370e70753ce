use serde::{Deserialize, Serialize};

/// Untyped scalar exactly as it arrived from a sensor feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    #[default]
    Missing,
    /// Anything else a JSON feed can carry (booleans, arrays, objects).
    Unsupported(serde_json::Value),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Missing)
    }
}

/// Raw sensor event. The pipeline only reads events, it never rewrites them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, alias = "reading")]
    pub value: RawValue,
    #[serde(default, alias = "ts")]
    pub timestamp: RawValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Event {
    pub fn new(value: impl Into<RawValue>, timestamp: impl Into<RawValue>) -> Self {
        Self {
            value: value.into(),
            timestamp: timestamp.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_feed_decodes_every_shape() {
        let events: Vec<Event> = serde_json::from_str(
            r#"[
                {"ts": 3, "reading": " NaN", "tag": "sensor"},
                {"ts": 2, "reading": 5.4},
                {"ts": 1, "reading": null},
                {"timestamp": "4", "value": true},
                {"tag": "orphan"}
            ]"#,
        )
        .unwrap();

        assert_eq!(events[0].value, RawValue::Text(" NaN".into()));
        assert_eq!(events[0].tag.as_deref(), Some("sensor"));
        assert_eq!(events[1].value, RawValue::Number(5.4));
        assert_eq!(events[1].timestamp, RawValue::Number(2.0));
        assert_eq!(events[2].value, RawValue::Missing);
        assert!(matches!(events[3].value, RawValue::Unsupported(_)));
        assert_eq!(events[3].timestamp, RawValue::Text("4".into()));
        assert_eq!(events[4].value, RawValue::Missing);
        assert_eq!(events[4].timestamp, RawValue::Missing);
    }

    #[test]
    fn optional_values_map_to_missing() {
        let event = Event::new(None::<f64>, 7i64);
        assert_eq!(event.value, RawValue::Missing);
        assert_eq!(event.timestamp, RawValue::Number(7.0));
    }
}
