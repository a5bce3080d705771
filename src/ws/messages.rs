//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message with a numeric code.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u32, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
///
/// Arisan ids may be given as numbers or numeric strings; `"*"` selects
/// every arisan.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to events for specific arisans.
    Subscribe {
        /// Arisan ids to subscribe to. Use `["*"]` for all arisans.
        arisan_ids: Vec<serde_json::Value>,
    },
    /// Unsubscribe from events for specific arisans.
    Unsubscribe {
        /// Arisan ids to unsubscribe from.
        arisan_ids: Vec<serde_json::Value>,
    },
    /// Get the full state of one arisan.
    GetState {
        /// Target arisan id.
        arisan_id: u64,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_parses() {
        let payload = serde_json::json!({ "command": "subscribe", "arisan_ids": [1, "2", "*"] });
        let Ok(WsCommand::Subscribe { arisan_ids }) = serde_json::from_value::<WsCommand>(payload)
        else {
            panic!("expected subscribe");
        };
        assert_eq!(arisan_ids.len(), 3);
    }

    #[test]
    fn envelope_uses_type_field() {
        let msg = WsMessage::error("abc", 400, "malformed JSON");
        let Ok(json) = serde_json::to_value(&msg) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("type").and_then(|v| v.as_str()), Some("error"));
        assert_eq!(
            json.pointer("/payload/code").and_then(serde_json::Value::as_u64),
            Some(400)
        );
    }
}
