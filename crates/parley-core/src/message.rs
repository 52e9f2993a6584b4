//! Message types for the conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved sender identity for the backend AI agent.
///
/// Inbound room events whose sender equals this identity are rendered with
/// [`MessageOrigin::Assistant`] instead of [`MessageOrigin::RemotePeer`].
pub const ASSISTANT_IDENTITY: &str = "AI_Assistant";

/// Unique identifier for a log message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a log entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Typed by the local user (optimistic echo).
    LocalUser,
    /// Received from another room participant.
    RemotePeer,
    /// Produced by the AI assistant (canned or backend reply).
    Assistant,
    /// Produced locally to describe a failure or status change.
    System,
}

/// A single entry in the conversation log.
///
/// Messages are never mutated in place; transient entries (typing
/// placeholders) are removed atomically with their terminal replacement
/// and are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Display name of the sender.
    pub sender: String,
    /// Message text.
    pub content: String,
    /// When the entry was created (UTC).
    pub timestamp: DateTime<Utc>,
    /// Where the entry came from.
    pub origin: MessageOrigin,
    /// In-flight "typing" placeholder flag.
    pub transient: bool,
}

impl Message {
    fn new(sender: impl Into<String>, content: impl Into<String>, origin: MessageOrigin) -> Self {
        Self {
            id: MessageId::new(),
            sender: sender.into(),
            content: content.into(),
            timestamp: Utc::now(),
            origin,
            transient: false,
        }
    }

    /// Optimistic local echo of an outgoing message.
    pub fn local_echo(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessageOrigin::LocalUser)
    }

    /// Message received from another room participant.
    pub fn remote(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, MessageOrigin::RemotePeer)
    }

    /// Reply from the AI assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ASSISTANT_IDENTITY, content, MessageOrigin::Assistant)
    }

    /// Locally generated status/failure notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content, MessageOrigin::System)
    }

    /// Transient "assistant is composing" placeholder.
    pub fn typing_placeholder() -> Self {
        let mut message = Self::new(
            ASSISTANT_IDENTITY,
            "Assistant is typing…",
            MessageOrigin::Assistant,
        );
        message.transient = true;
        message
    }
}
