//! Session model, connection lifecycle states, and the session store seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Credentials of the active (or last known) room session.
///
/// Owned by the conversation state machine; mirrored into the
/// [`SessionStore`] on a successful connect and cleared on disconnect.
/// At most one session is active per client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Display name the user joined with.
    pub username: String,
    /// Name of the joined room.
    pub room_name: String,
}

impl Session {
    /// Creates a session record.
    pub fn new(username: impl Into<String>, room_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            room_name: room_name.into(),
        }
    }
}

/// Connection lifecycle of the client.
///
/// Exactly one instance exists per client; transitions happen only through
/// the conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and none in progress.
    Idle,
    /// A connect sequence is running.
    Connecting,
    /// Joined a room.
    Connected,
    /// An orderly teardown is running.
    Disconnecting,
}

/// Durable store for the last-known session record.
///
/// Strictly best-effort convenience state: implementations swallow their
/// own IO/parse failures and never surface them to the user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads the persisted session, or `None` when absent or malformed.
    async fn load(&self) -> Option<Session>;

    /// Overwrites the persisted record.
    async fn save(&self, session: &Session);

    /// Removes the persisted record.
    async fn clear(&self);
}
