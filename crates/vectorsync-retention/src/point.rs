use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use vectorsync_config::RetentionConfig;
use vectorsync_index::PayloadPoint;
use vectorsync_common::PointId;

/// Payload keys that carry a point's partition and recency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFields {
    pub timestamp: String,
    pub partition: String,
}

impl Default for PayloadFields {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for PayloadFields {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            timestamp: config.timestamp_field.clone(),
            partition: config.partition_field.clone(),
        }
    }
}

/// The parts of a stored point that retention decisions depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedPoint {
    pub id: PointId,
    pub partition: Option<String>,
    /// `None` means the point is treated as infinitely old.
    pub timestamp: Option<DateTime<Utc>>,
}

impl RetainedPoint {
    /// Resolve partition and timestamp from a scanned payload.
    ///
    /// Top-level payload keys win. Conversation memories keep their metadata
    /// as a JSON object inside the `text` field, so that is consulted next.
    pub fn from_payload(point: PayloadPoint, fields: &PayloadFields) -> Self {
        let embedded = embedded_object(&point.payload);
        let lookup = |key: &str| {
            point
                .payload
                .get(key)
                .or_else(|| embedded.as_ref().and_then(|m| m.get(key)))
                .filter(|v| !v.is_null())
        };

        let partition = lookup(&fields.partition).and_then(partition_value);
        let timestamp = lookup(&fields.timestamp).and_then(parse_timestamp);

        Self {
            id: point.id,
            partition,
            timestamp,
        }
    }
}

fn embedded_object(payload: &Map<String, Value>) -> Option<Map<String, Value>> {
    let text = payload.get("text")?.as_str()?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn partition_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer or fractional Unix seconds, or an RFC 3339 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                let secs = n.as_f64()?;
                DateTime::from_timestamp_millis((secs * 1000.0) as i64)
            }
        }
        Value::String(s) => {
            if let Ok(secs) = s.trim().parse::<i64>() {
                return DateTime::from_timestamp(secs, 0);
            }
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}
