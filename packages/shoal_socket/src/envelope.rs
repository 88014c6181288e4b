//! Wire envelope exchanged over the chat WebSocket.
//!
//! One WebSocket text message = one JSON envelope:
//! `{ "event": "<name>", "payload": <any JSON value or null> }`
//!
//! The payload is opaque to the transport layer; each named event's schema
//! is a convention between the server and the subscribers for that event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{event, payload}` unit carried by every frame, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Application-level message kind.
    pub event: String,
    /// Arbitrary structured value, not validated here.
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serde() {
        let env = Envelope::new("message", json!({"x": 1}));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"], "message");
        assert_eq!(json["payload"]["x"], 1);
        let rt: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(rt.event, "message");
        assert_eq!(rt.payload, json!({"x": 1}));
    }

    #[test]
    fn envelope_missing_payload_defaults_to_null() {
        let env: Envelope = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(env.event, "ping");
        assert!(env.payload.is_null());
    }

    #[test]
    fn envelope_null_payload_roundtrip() {
        let env = Envelope::new("keep_connect", Value::Null);
        let s = serde_json::to_string(&env).unwrap();
        assert_eq!(s, r#"{"event":"keep_connect","payload":null}"#);
        let rt: Envelope = serde_json::from_str(&s).unwrap();
        assert!(rt.payload.is_null());
    }

    #[test]
    fn envelope_rejects_non_envelope_shapes() {
        assert!(serde_json::from_str::<Envelope>("not json").is_err());
        assert!(serde_json::from_str::<Envelope>(r#"{"payload":1}"#).is_err());
        assert!(serde_json::from_str::<Envelope>("[1,2,3]").is_err());
    }
}
