//! The `{type, data}` wire envelope and dispatch outcome types.
//!
//! An [`Envelope`] is the only unit that crosses the channel: a `type`
//! discriminator plus an opaque application payload. The channel layer
//! reserves `ping` and `pong` for heartbeats (consumed internally, never
//! surfaced to the application) and `error` for protocol/handler failure
//! replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Reserved type: client→server heartbeat probe.
pub const TYPE_PING: &str = "ping";
/// Reserved type: server→client heartbeat reply.
pub const TYPE_PONG: &str = "pong";
/// Reserved type: failure reply unicast to the offending sender.
pub const TYPE_ERROR: &str = "error";

/// The wire unit exchanged over the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminator string. Application-defined except for the reserved
    /// `ping`/`pong`/`error` types.
    #[serde(rename = "type")]
    pub kind: String,
    /// Application payload, opaque to the channel layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Create an envelope with a payload.
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
        }
    }

    /// Create an envelope with no payload.
    #[must_use]
    pub fn bare(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
        }
    }

    /// The heartbeat probe.
    #[must_use]
    pub fn ping() -> Self {
        Self::bare(TYPE_PING)
    }

    /// The heartbeat reply.
    #[must_use]
    pub fn pong() -> Self {
        Self::bare(TYPE_PONG)
    }

    /// An error reply carrying a human-readable message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(TYPE_ERROR, serde_json::json!({ "message": message.into() }))
    }

    /// Whether this is the reserved heartbeat probe.
    #[must_use]
    pub fn is_ping(&self) -> bool {
        self.kind == TYPE_PING
    }

    /// Whether this is the reserved heartbeat reply.
    #[must_use]
    pub fn is_pong(&self) -> bool {
        self.kind == TYPE_PONG
    }

    /// Parse a raw text frame into an envelope.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Malformed)
    }

    /// Serialize to the wire representation.
    ///
    /// An envelope is a flat struct of serializable fields; serialization
    /// cannot fail.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Delivery target for an outbound envelope produced by a [`Handler`].
///
/// [`Handler`]: crate::Handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Reply to the connection that sent the triggering envelope.
    Sender,
    /// Fan out to every live member of the registry, sender included.
    Broadcast,
}

/// An outbound envelope tagged with its delivery target.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    /// Where to deliver.
    pub target: Target,
    /// What to deliver.
    pub envelope: Envelope,
}

impl Outbound {
    /// Reply to the sender only.
    #[must_use]
    pub fn reply(envelope: Envelope) -> Self {
        Self {
            target: Target::Sender,
            envelope,
        }
    }

    /// Broadcast to all live members.
    #[must_use]
    pub fn broadcast(envelope: Envelope) -> Self {
        Self {
            target: Target::Broadcast,
            envelope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_field() {
        let env = Envelope::new("array", serde_json::json!([3, 1, 4]));
        let json = env.to_json();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "array");
        assert_eq!(parsed["data"], serde_json::json!([3, 1, 4]));
    }

    #[test]
    fn bare_envelope_omits_data() {
        let json = Envelope::ping().to_json();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn parses_envelope_without_data() {
        let env = Envelope::from_json(r#"{"type":"pong"}"#).unwrap();
        assert!(env.is_pong());
        assert!(env.data.is_none());
    }

    #[test]
    fn parses_envelope_with_data() {
        let env = Envelope::from_json(r#"{"type":"update","data":{"x":1}}"#).unwrap();
        assert_eq!(env.kind, "update");
        assert_eq!(env.data.unwrap()["x"], 1);
    }

    #[test]
    fn rejects_non_json() {
        let err = Envelope::from_json("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn rejects_non_object() {
        assert!(Envelope::from_json("[1,2,3]").is_err());
        assert!(Envelope::from_json("42").is_err());
    }

    #[test]
    fn rejects_missing_type() {
        assert!(Envelope::from_json(r#"{"data":[1]}"#).is_err());
    }

    #[test]
    fn error_envelope_carries_message() {
        let env = Envelope::error("bad frame");
        assert_eq!(env.kind, TYPE_ERROR);
        assert_eq!(env.data.unwrap()["message"], "bad frame");
    }

    #[test]
    fn reserved_type_predicates() {
        assert!(Envelope::ping().is_ping());
        assert!(!Envelope::ping().is_pong());
        assert!(Envelope::pong().is_pong());
        assert!(!Envelope::bare("update").is_ping());
    }

    #[test]
    fn outbound_constructors_tag_targets() {
        let reply = Outbound::reply(Envelope::pong());
        assert_eq!(reply.target, Target::Sender);
        let fan = Outbound::broadcast(Envelope::bare("update"));
        assert_eq!(fan.target, Target::Broadcast);
    }

    #[test]
    fn roundtrip_preserves_payload() {
        let env = Envelope::new("update", serde_json::json!({"nested": {"deep": true}}));
        let back = Envelope::from_json(&env.to_json()).unwrap();
        assert_eq!(back, env);
    }
}
