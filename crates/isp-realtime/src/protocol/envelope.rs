//! Wire envelope
//!
//! Every frame in either direction is a JSON object `{ type, data, timestamp }`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope encode/decode errors
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Malformed frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Realtime message envelope
///
/// `event_type` is the routing key. The payload is opaque to the client and the
/// timestamp is carried through unvalidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing key (`type` on the wire)
    #[serde(rename = "type")]
    pub event_type: String,

    /// Opaque payload, `null` when the sender omitted it
    #[serde(default)]
    pub data: Value,

    /// ISO-8601 timestamp set by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    /// Create an outbound envelope stamped with the current time
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(json).map_err(EnvelopeError::Decode)
    }

    /// Deserialize from raw bytes (binary frames)
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(EnvelopeError::Decode)
    }

    /// The whole envelope as a JSON value, as handed to wildcard listeners
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::with_capacity(3);
        object.insert("type".to_string(), Value::String(self.event_type.clone()));
        object.insert("data".to_string(), self.data.clone());
        if let Some(ts) = &self.timestamp {
            object.insert("timestamp".to_string(), Value::String(ts.clone()));
        }
        Value::Object(object)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Envelope(type={}", self.event_type)?;
        if let Some(ts) = &self.timestamp {
            write!(f, ", ts={ts}")?;
        }
        write!(f, ")")
    }
}
