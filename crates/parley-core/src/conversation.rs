//! Conversation state machine.
//!
//! Owns the connection lifecycle, the ordered message log, and the
//! send/receive protocol. The log and [`ConnectionState`] are mutated only
//! here (single writer); the transport adapter and backend gateway are
//! reached through their seams and inbound wire events arrive over an mpsc
//! channel drained by this type.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{GatewayError, ParleyError, Result, SendError};
use crate::gateway::ChatGateway;
use crate::message::{Message, MessageId, ASSISTANT_IDENTITY};
use crate::quick_reply::quick_reply;
use crate::session::{ConnectionState, Session, SessionStore};
use crate::transport::{InboundEvent, RoomTransport};
use crate::wire::{self, ChatEnvelope};

/// Delay before a canned quick reply is surfaced, imitating composition.
const QUICK_REPLY_DELAY: Duration = Duration::from_secs(1);
/// Capacity of the UI event stream.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observable conversation updates for reactive front ends.
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    /// The connection lifecycle moved to a new state.
    StateChanged(ConnectionState),
    /// A message was appended to the log.
    MessageAppended(Message),
    /// A transient placeholder left the log in the same update that
    /// appended its terminal replacement.
    MessageReplaced {
        removed: MessageId,
        message: Message,
    },
    /// The log was emptied (disconnect).
    LogCleared,
    /// A user-facing error message was raised.
    ErrorRaised(String),
}

struct Inner {
    state: ConnectionState,
    session: Option<Session>,
    messages: Vec<Message>,
    last_error: Option<String>,
    /// Cancelled on disconnect so stale delayed completions are dropped
    /// instead of written into a torn-down log.
    epoch: CancellationToken,
}

/// The orchestrator of the chat client.
///
/// Create with [`Conversation::new`], which also spawns the inbound drain
/// task, and release with [`Conversation::shutdown`].
pub struct Conversation {
    inner: RwLock<Inner>,
    gateway: Arc<dyn ChatGateway>,
    transport: Arc<dyn RoomTransport>,
    store: Arc<dyn SessionStore>,
    config: ClientConfig,
    events: broadcast::Sender<ConversationEvent>,
    shutdown: CancellationToken,
}

impl Conversation {
    /// Wires the state machine to its collaborators and starts draining
    /// inbound wire events.
    pub fn new(
        config: ClientConfig,
        gateway: Arc<dyn ChatGateway>,
        transport: Arc<dyn RoomTransport>,
        store: Arc<dyn SessionStore>,
        inbound: mpsc::Receiver<InboundEvent>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();
        let conversation = Arc::new(Self {
            inner: RwLock::new(Inner {
                state: ConnectionState::Idle,
                session: None,
                messages: Vec::new(),
                last_error: None,
                epoch: shutdown.child_token(),
            }),
            gateway,
            transport,
            store,
            config,
            events,
            shutdown,
        });
        Self::spawn_inbound_drain(Arc::clone(&conversation), inbound);
        conversation
    }

    /// Subscribes to conversation updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// Current connection lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state
    }

    /// Snapshot of the message log.
    pub async fn messages(&self) -> Vec<Message> {
        self.inner.read().await.messages.clone()
    }

    /// The active session, if connected.
    pub async fn session(&self) -> Option<Session> {
        self.inner.read().await.session.clone()
    }

    /// The most recent user-facing error, cleared on each connect attempt.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    /// Joins a room: ensure it exists, obtain a token, connect the
    /// transport, then persist the session. The sequence short-circuits on
    /// the first failure and leaves no partial connection behind. A call
    /// while already connecting or connected is a silent no-op.
    pub async fn connect(&self, room_name: &str, username: &str) -> Result<()> {
        {
            let mut inner = self.inner.write().await;
            if inner.state != ConnectionState::Idle {
                debug!(state = ?inner.state, "connect ignored while busy");
                return Ok(());
            }
            inner.state = ConnectionState::Connecting;
            inner.last_error = None;
            inner.epoch = self.shutdown.child_token();
        }
        self.emit(ConversationEvent::StateChanged(ConnectionState::Connecting));

        if let Err(err) = self.gateway.ensure_room(room_name).await {
            return self
                .fail_connect(format!("Failed to create room: {err}"), err.into())
                .await;
        }

        let token = match self.gateway.issue_token(room_name, username).await {
            Ok(token) => token,
            Err(err) => {
                return self
                    .fail_connect(format!("Failed to obtain access token: {err}"), err.into())
                    .await;
            }
        };

        if let Err(err) = self
            .transport
            .connect(&self.config.room_url, token.as_str())
            .await
        {
            // A half-open handle must not outlive a failed connect.
            self.transport.disconnect().await;
            return self
                .fail_connect(format!("Failed to connect: {err}"), err.into())
                .await;
        }

        let session = Session::new(username, room_name);
        {
            let mut inner = self.inner.write().await;
            inner.state = ConnectionState::Connected;
            inner.session = Some(session.clone());
        }
        self.store.save(&session).await;
        self.emit(ConversationEvent::StateChanged(ConnectionState::Connected));
        info!(room = room_name, user = username, "joined room");
        Ok(())
    }

    /// Attempts to rejoin the room recorded by a previous run. Returns
    /// `Ok(false)` when no session was persisted; a failed rejoin behaves
    /// exactly like a fresh failed connect.
    pub async fn restore(&self) -> Result<bool> {
        let Some(session) = self.store.load().await else {
            return Ok(false);
        };
        info!(room = %session.room_name, user = %session.username, "restoring previous session");
        self.connect(&session.room_name, &session.username).await?;
        Ok(true)
    }

    /// Sends a message into the room.
    ///
    /// The local echo is appended before any network activity; a broadcast
    /// failure is reported but never rolls the echo back. The assistant
    /// reply path appends a transient placeholder which is later swapped,
    /// in one observable update, for the canned reply, the backend reply,
    /// or a system notice naming the failure class.
    pub async fn send_message(self: &Arc<Self>, content: &str) -> std::result::Result<(), SendError> {
        let (session, epoch) = {
            let inner = self.inner.read().await;
            if inner.state != ConnectionState::Connected {
                return Err(SendError::NotConnected);
            }
            let session = inner.session.clone().ok_or(SendError::NotConnected)?;
            (session, inner.epoch.clone())
        };

        self.append(Message::local_echo(&session.username, content))
            .await;

        let payload = ChatEnvelope::chat(content).to_json();
        if let Err(err) = self.transport.broadcast(&payload).await {
            // Delivery is best-effort; the echo stands regardless.
            warn!(error = %err, "broadcast failed");
            let message = format!("Failed to send message: {err}");
            self.inner.write().await.last_error = Some(message.clone());
            self.emit(ConversationEvent::ErrorRaised(message));
        }

        let placeholder = Message::typing_placeholder();
        let placeholder_id = placeholder.id.clone();
        self.append(placeholder).await;

        if let Some(reply) = quick_reply(content) {
            let conversation = Arc::clone(self);
            tokio::spawn(async move {
                tokio::select! {
                    _ = epoch.cancelled() => {}
                    _ = tokio::time::sleep(QUICK_REPLY_DELAY) => {
                        conversation
                            .resolve_placeholder(&placeholder_id, Message::assistant(reply))
                            .await;
                    }
                }
            });
        } else {
            let conversation = Arc::clone(self);
            let room = session.room_name;
            let user = session.username;
            let text = content.to_string();
            tokio::spawn(async move {
                // The gateway call is bounded by its own timeout and is not
                // cancellable; the epoch check keeps a late completion from
                // touching a torn-down log.
                let outcome = conversation
                    .gateway
                    .request_reply(&room, &user, &text)
                    .await;
                if epoch.is_cancelled() {
                    return;
                }
                let replacement = match outcome {
                    Ok(reply) => Message::assistant(reply),
                    Err(err) => Message::system(describe_reply_failure(&err)),
                };
                conversation
                    .resolve_placeholder(&placeholder_id, replacement)
                    .await;
            });
        }

        Ok(())
    }

    /// Leaves the room: tears down the transport, clears the log and the
    /// persisted session. No-op unless connected; safe to call twice.
    pub async fn disconnect(&self) {
        {
            let mut inner = self.inner.write().await;
            if inner.state != ConnectionState::Connected {
                debug!(state = ?inner.state, "disconnect ignored");
                return;
            }
            inner.state = ConnectionState::Disconnecting;
            inner.epoch.cancel();
        }
        self.emit(ConversationEvent::StateChanged(ConnectionState::Disconnecting));

        self.transport.disconnect().await;

        {
            let mut inner = self.inner.write().await;
            inner.messages.clear();
            inner.session = None;
            inner.state = ConnectionState::Idle;
        }
        self.store.clear().await;
        self.emit(ConversationEvent::LogCleared);
        self.emit(ConversationEvent::StateChanged(ConnectionState::Idle));
        info!("left room");
    }

    /// Releases everything: pending completions are cancelled, the inbound
    /// drain stops, and the transport is disconnected. Call once at owner
    /// teardown; every exit path of the owner should reach this.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.disconnect().await;
        self.transport.disconnect().await;
    }

    fn spawn_inbound_drain(conversation: Arc<Self>, mut inbound: mpsc::Receiver<InboundEvent>) {
        let stop = conversation.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    event = inbound.recv() => match event {
                        Some(event) => conversation.handle_inbound(event).await,
                        None => break,
                    },
                }
            }
            debug!("inbound drain stopped");
        });
    }

    async fn handle_inbound(&self, event: InboundEvent) {
        let Some(content) = wire::extract_content(&event.payload) else {
            debug!(sender = %event.sender, "ignoring non-chat payload");
            return;
        };
        let message = if event.sender == ASSISTANT_IDENTITY {
            Message::assistant(content)
        } else {
            Message::remote(event.sender, content)
        };

        {
            let mut inner = self.inner.write().await;
            if inner.state != ConnectionState::Connected {
                debug!("dropping inbound event while not connected");
                return;
            }
            inner.messages.push(message.clone());
        }
        self.emit(ConversationEvent::MessageAppended(message));
    }

    async fn append(&self, message: Message) {
        self.inner.write().await.messages.push(message.clone());
        self.emit(ConversationEvent::MessageAppended(message));
    }

    /// Swaps a transient placeholder for its terminal replacement in one
    /// critical section, so the log is never observed with both or with
    /// neither. Completions whose placeholder is already gone are dropped.
    async fn resolve_placeholder(&self, placeholder: &MessageId, replacement: Message) {
        let mut inner = self.inner.write().await;
        let Some(index) = inner.messages.iter().position(|m| &m.id == placeholder) else {
            debug!(%placeholder, "placeholder gone, dropping completion");
            return;
        };
        inner.messages.remove(index);
        inner.messages.push(replacement.clone());
        drop(inner);
        self.emit(ConversationEvent::MessageReplaced {
            removed: placeholder.clone(),
            message: replacement,
        });
    }

    async fn fail_connect(&self, message: String, err: ParleyError) -> Result<()> {
        warn!(error = %message, "connect failed");
        {
            let mut inner = self.inner.write().await;
            inner.state = ConnectionState::Idle;
            inner.session = None;
            inner.last_error = Some(message.clone());
        }
        // A failed connect must not leave a stale persisted session behind.
        self.store.clear().await;
        self.emit(ConversationEvent::ErrorRaised(message));
        self.emit(ConversationEvent::StateChanged(ConnectionState::Idle));
        Err(err)
    }

    fn emit(&self, event: ConversationEvent) {
        // Nobody listening is fine; the log snapshot stays authoritative.
        let _ = self.events.send(event);
    }
}

fn describe_reply_failure(err: &GatewayError) -> String {
    match err {
        GatewayError::ServerError(status) => {
            format!("The assistant could not reply: server error (status {status}).")
        }
        GatewayError::NoResponse => "The assistant did not respond in time.".to_string(),
        GatewayError::RequestError(detail) => {
            format!("The assistant request failed: {detail}")
        }
    }
}
