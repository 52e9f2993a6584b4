//! HttpChatGateway - reqwest implementation of the `ChatGateway` seam.
//!
//! Three endpoints, each with its own timeout. Calls are never retried;
//! the conversation layer decides what a failure means for the user.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use parley_core::error::GatewayError;
use parley_core::gateway::{AccessToken, ChatGateway};

/// Timeout for room creation and token issuance.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the AI reply call, which does real generation work.
const REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway implementation that talks to the parley backend over HTTP.
#[derive(Clone)]
pub struct HttpChatGateway {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    room: &'a str,
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    room: &'a str,
    username: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

impl HttpChatGateway {
    /// Creates a gateway against the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "backend returned an error status");
            return Err(GatewayError::ServerError(status.as_u16()));
        }
        Ok(response)
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() || err.is_connect() {
        GatewayError::NoResponse
    } else {
        GatewayError::RequestError(err.to_string())
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn ensure_room(&self, room: &str) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("create-room/{room}"));
        let response = self
            .client
            .post(&url)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .map_err(map_transport_error)?;
        Self::check_status(response).await?;
        tracing::debug!(room, "room ensured");
        Ok(())
    }

    async fn issue_token(&self, room: &str, username: &str) -> Result<AccessToken, GatewayError> {
        let url = self.endpoint("token");
        let response = self
            .client
            .post(&url)
            .timeout(CONTROL_TIMEOUT)
            .json(&TokenRequest { room, username })
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: TokenResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| GatewayError::RequestError(format!("malformed token response: {err}")))?;
        Ok(AccessToken(parsed.token))
    }

    async fn request_reply(
        &self,
        room: &str,
        username: &str,
        message: &str,
    ) -> Result<String, GatewayError> {
        let url = self.endpoint("chat");
        let response = self
            .client
            .post(&url)
            .timeout(REPLY_TIMEOUT)
            .json(&ChatRequest {
                room,
                username,
                message,
            })
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: ChatResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| GatewayError::RequestError(format!("malformed chat response: {err}")))?;
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_joined_without_double_slashes() {
        let gateway = HttpChatGateway::new("http://localhost:8000/");
        assert_eq!(
            gateway.endpoint("create-room/lobby"),
            "http://localhost:8000/create-room/lobby"
        );
        assert_eq!(gateway.endpoint("token"), "http://localhost:8000/token");
        assert_eq!(gateway.endpoint("chat"), "http://localhost:8000/chat");
    }

    #[test]
    fn response_bodies_deserialize() {
        let token: TokenResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(token.token, "abc");

        let chat: ChatResponse = serde_json::from_str(r#"{"response":"hello"}"#).unwrap();
        assert_eq!(chat.response, "hello");
    }

    #[test]
    fn request_bodies_serialize_with_expected_fields() {
        let body = serde_json::to_value(ChatRequest {
            room: "lobby",
            username: "alice",
            message: "hi",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"room": "lobby", "username": "alice", "message": "hi"})
        );
    }
}
