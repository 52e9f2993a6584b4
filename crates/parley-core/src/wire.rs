//! Wire envelope for chat payloads.
//!
//! Outbound messages are broadcast as a small JSON envelope
//! `{"type": "chat", "content": ...}`. Inbound payloads are parsed with the
//! same envelope; payloads that are not a valid envelope are treated as
//! bare message text so peers speaking the flat format still render.

use serde::{Deserialize, Serialize};

/// Envelope discriminator for chat payloads. Other values are reserved for
/// future payload kinds and are ignored on receipt.
pub const CHAT_PAYLOAD_TYPE: &str = "chat";

/// The broadcast payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    /// Payload discriminator, `"chat"` for chat messages.
    #[serde(rename = "type")]
    pub kind: String,
    /// The message text.
    pub content: String,
}

impl ChatEnvelope {
    /// Wraps message text in a chat envelope.
    pub fn chat(content: impl Into<String>) -> Self {
        Self {
            kind: CHAT_PAYLOAD_TYPE.to_string(),
            content: content.into(),
        }
    }

    /// Serializes the envelope for broadcast.
    pub fn to_json(&self) -> String {
        // A struct of two strings cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| self.content.clone())
    }
}

/// Extracts message text from an inbound payload.
///
/// Valid chat envelopes yield their `content` field; envelopes with an
/// unknown `type` yield `None` (reserved for future payload kinds);
/// anything that does not parse as an envelope is returned verbatim.
pub fn extract_content(payload: &str) -> Option<String> {
    match serde_json::from_str::<ChatEnvelope>(payload) {
        Ok(envelope) if envelope.kind == CHAT_PAYLOAD_TYPE => Some(envelope.content),
        Ok(_) => None,
        Err(_) => Some(payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        let json = ChatEnvelope::chat("hello room").to_json();
        assert_eq!(extract_content(&json).as_deref(), Some("hello room"));
    }

    #[test]
    fn bare_text_is_taken_verbatim() {
        assert_eq!(extract_content("just text").as_deref(), Some("just text"));
    }

    #[test]
    fn unknown_payload_kind_is_ignored() {
        let payload = r#"{"type":"presence","content":"joined"}"#;
        assert_eq!(extract_content(payload), None);
    }

    #[test]
    fn envelope_uses_type_discriminator_on_the_wire() {
        let json = ChatEnvelope::chat("x").to_json();
        assert!(json.contains(r#""type":"chat""#));
    }
}
