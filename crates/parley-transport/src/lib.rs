//! WebSocket implementation of the room transport.

mod websocket;

pub use websocket::WebSocketTransport;
