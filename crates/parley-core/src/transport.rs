//! Room transport seam.
//!
//! The adapter owns the real-time connection handle. Inbound wire events
//! are pushed onto an mpsc channel the conversation drains on its own
//! turn, keeping the message log single-writer.

use async_trait::async_trait;

use crate::error::{ConnectError, SendError};

/// An inbound wire event from the room service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Identity of the participant that published the payload.
    pub sender: String,
    /// The raw payload text (normally a chat envelope, see [`crate::wire`]).
    pub payload: String,
}

/// Adapter over the real-time room client.
///
/// Implementations are constructed with the inbound channel sender and own
/// the connection lifecycle. Every exit path (connect failure, explicit
/// disconnect, drop of the handle) must leave the underlying connection
/// torn down.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Establishes the room connection. Valid only from a disconnected
    /// handle; the access token comes from the backend gateway.
    async fn connect(&self, url: &str, token: &str) -> std::result::Result<(), ConnectError>;

    /// Broadcasts a payload to every room participant. Fails when the
    /// handle is not connected; delivery is best-effort with no
    /// acknowledgement.
    async fn broadcast(&self, payload: &str) -> std::result::Result<(), SendError>;

    /// Tears the connection down. No-op when already disconnected.
    async fn disconnect(&self);
}
