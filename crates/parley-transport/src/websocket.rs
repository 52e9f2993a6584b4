//! WebSocket client for the real-time room service.
//!
//! Owns the socket and a reader task. Frames received from the room are
//! decoded and forwarded over the inbound mpsc channel; the conversation
//! layer decides what they mean.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use parley_core::error::{ConnectError, SendError};
use parley_core::transport::{InboundEvent, RoomTransport};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Data frame published into the room by a participant.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    sender: String,
    payload: String,
}

struct ConnectionHandle {
    writer: WsSink,
    reader: JoinHandle<()>,
}

/// Room transport backed by a single WebSocket connection.
pub struct WebSocketTransport {
    connection: Mutex<Option<ConnectionHandle>>,
    inbound: mpsc::Sender<InboundEvent>,
}

impl WebSocketTransport {
    /// Creates a disconnected transport that forwards room events to the
    /// given channel.
    pub fn new(inbound: mpsc::Sender<InboundEvent>) -> Self {
        Self {
            connection: Mutex::new(None),
            inbound,
        }
    }

    fn spawn_reader(mut source: WsSource, inbound: mpsc::Sender<InboundEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<InboundFrame>(&text) {
                        Ok(frame) => {
                            let event = InboundEvent {
                                sender: frame.sender,
                                payload: frame.payload,
                            };
                            if inbound.send(event).await.is_err() {
                                debug!("inbound channel closed, stopping reader");
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "ignoring undecodable room frame");
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("room closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "room socket error, stopping reader");
                        break;
                    }
                }
            }
        })
    }
}

fn map_connect_error(err: tungstenite::Error) -> ConnectError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status == 401 || status == 403 {
                ConnectError::Auth(format!("room service rejected the token (status {status})"))
            } else {
                ConnectError::Unknown(format!("room service answered with status {status}"))
            }
        }
        tungstenite::Error::Io(err) => ConnectError::Network(err.to_string()),
        tungstenite::Error::Url(err) => ConnectError::Unknown(format!("invalid room URL: {err}")),
        other => ConnectError::Unknown(other.to_string()),
    }
}

#[async_trait]
impl RoomTransport for WebSocketTransport {
    async fn connect(&self, url: &str, token: &str) -> Result<(), ConnectError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Err(ConnectError::Unknown(
                "transport already connected".to_string(),
            ));
        }

        let mut request = url
            .into_client_request()
            .map_err(|err| ConnectError::Unknown(format!("invalid room URL: {err}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| ConnectError::Auth(format!("token is not header-safe: {err}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, response) = connect_async(request).await.map_err(map_connect_error)?;
        info!(url, status = ?response.status(), "room connection established");

        let (writer, source) = stream.split();
        let reader = Self::spawn_reader(source, self.inbound.clone());
        *connection = Some(ConnectionHandle { writer, reader });
        Ok(())
    }

    async fn broadcast(&self, payload: &str) -> Result<(), SendError> {
        let mut connection = self.connection.lock().await;
        let Some(handle) = connection.as_mut() else {
            return Err(SendError::NotConnected);
        };
        if let Err(err) = handle.writer.send(Message::Text(payload.to_string())).await {
            warn!(error = %err, "broadcast write failed, dropping connection");
            if let Some(handle) = connection.take() {
                handle.reader.abort();
            }
            return Err(SendError::NotConnected);
        }
        Ok(())
    }

    async fn disconnect(&self) {
        let mut connection = self.connection.lock().await;
        if let Some(mut handle) = connection.take() {
            // Best effort: the peer may already be gone.
            let _ = handle.writer.send(Message::Close(None)).await;
            handle.reader.abort();
            info!("room connection closed");
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Ok(mut connection) = self.connection.try_lock() {
            if let Some(handle) = connection.take() {
                handle.reader.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    #[test]
    fn inbound_frames_decode_sender_and_payload() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"sender":"bob","payload":"{\"type\":\"chat\",\"content\":\"hi\"}"}"#)
                .unwrap();
        assert_eq!(frame.sender, "bob");
        assert!(frame.payload.contains("chat"));
    }

    #[test]
    fn http_rejection_maps_to_auth_or_unknown() {
        let unauthorized = Response::builder().status(401).body(None).unwrap();
        assert!(matches!(
            map_connect_error(tungstenite::Error::Http(unauthorized)),
            ConnectError::Auth(_)
        ));

        let teapot = Response::builder().status(418).body(None).unwrap();
        assert!(matches!(
            map_connect_error(tungstenite::Error::Http(teapot)),
            ConnectError::Unknown(_)
        ));
    }

    #[test]
    fn io_errors_map_to_network() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_connect_error(tungstenite::Error::Io(err)),
            ConnectError::Network(_)
        ));
    }

    #[tokio::test]
    async fn broadcast_without_a_connection_fails() {
        let (tx, _rx) = mpsc::channel(4);
        let transport = WebSocketTransport::new(tx);
        assert_eq!(
            transport.broadcast("payload").await,
            Err(SendError::NotConnected)
        );
    }

    #[tokio::test]
    async fn disconnect_without_a_connection_is_a_noop() {
        let (tx, _rx) = mpsc::channel(4);
        let transport = WebSocketTransport::new(tx);
        transport.disconnect().await;
    }
}
