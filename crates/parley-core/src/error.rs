//! Error types for the parley client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes for establishing the real-time room connection.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectError {
    /// The transport could not be reached (DNS, refused connection, IO).
    #[error("network error: {0}")]
    Network(String),

    /// The room service rejected the supplied access token.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Anything the transport could not classify further.
    #[error("connection failed: {0}")]
    Unknown(String),
}

/// Failure classes for sending a message into the room.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendError {
    /// The client is not connected to a room.
    #[error("not connected to a room")]
    NotConnected,
}

/// Failure classes for backend gateway calls.
///
/// Each variant maps to a distinguishable outcome of an HTTP exchange:
/// the server answered with a non-success status, the server never
/// answered at all, or the request could not be built/understood.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayError {
    /// The backend responded with a non-2xx status code.
    #[error("server error (status {0})")]
    ServerError(u16),

    /// No response was received before the call's timeout elapsed.
    #[error("no response received from the backend")]
    NoResponse,

    /// The request failed before or after the exchange (setup, malformed body).
    #[error("request error: {0}")]
    RequestError(String),
}

/// A shared error type for the whole parley client.
///
/// Component-specific errors convert into this via `From` so callers can
/// use `?` across layer boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParleyError {
    /// Room connection failure.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Send failure.
    #[error(transparent)]
    Send(#[from] SendError),

    /// Backend gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Creates a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a connect-phase error.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    /// Check if this is a gateway error.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }
}

/// A type alias for `Result<T, ParleyError>`.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_display_names_the_failure_class() {
        assert_eq!(
            GatewayError::ServerError(502).to_string(),
            "server error (status 502)"
        );
        assert_eq!(
            GatewayError::NoResponse.to_string(),
            "no response received from the backend"
        );
        assert_eq!(
            GatewayError::RequestError("bad body".into()).to_string(),
            "request error: bad body"
        );
    }

    #[test]
    fn component_errors_convert_into_parley_error() {
        let err: ParleyError = SendError::NotConnected.into();
        assert!(matches!(err, ParleyError::Send(SendError::NotConnected)));

        let err: ParleyError = GatewayError::NoResponse.into();
        assert!(err.is_gateway());
    }
}
