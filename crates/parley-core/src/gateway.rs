//! Backend chat gateway seam.

use async_trait::async_trait;

use crate::error::GatewayError;

/// Access token issued by the backend for joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl AccessToken {
    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The three backend calls the client depends on.
///
/// Each call carries its own timeout and error mapping; none is retried
/// automatically.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Creates the room on the backend if it does not exist yet.
    async fn ensure_room(&self, room: &str) -> std::result::Result<(), GatewayError>;

    /// Issues an access token for joining the room under the given name.
    async fn issue_token(
        &self,
        room: &str,
        username: &str,
    ) -> std::result::Result<AccessToken, GatewayError>;

    /// Requests an AI-generated reply for a message (15 s timeout).
    async fn request_reply(
        &self,
        room: &str,
        username: &str,
        message: &str,
    ) -> std::result::Result<String, GatewayError>;
}
