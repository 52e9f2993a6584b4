//! Domain layer for the parley chat client.
//!
//! The conversation state machine lives here together with the message
//! log model, the quick-reply matcher, and the seams (`ChatGateway`,
//! `RoomTransport`, `SessionStore`) that the outer crates implement.

pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod message;
pub mod quick_reply;
pub mod session;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod conversation_test;

// Re-export the common surface.
pub use config::ClientConfig;
pub use conversation::{Conversation, ConversationEvent};
pub use error::{ConnectError, GatewayError, ParleyError, SendError};
pub use gateway::{AccessToken, ChatGateway};
pub use message::{Message, MessageId, MessageOrigin, ASSISTANT_IDENTITY};
pub use quick_reply::quick_reply;
pub use session::{ConnectionState, Session, SessionStore};
pub use transport::{InboundEvent, RoomTransport};
