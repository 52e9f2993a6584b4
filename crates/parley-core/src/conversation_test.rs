use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::config::ClientConfig;
use crate::conversation::{Conversation, ConversationEvent};
use crate::error::{ConnectError, GatewayError, SendError};
use crate::gateway::{AccessToken, ChatGateway};
use crate::message::{Message, MessageOrigin, ASSISTANT_IDENTITY};
use crate::quick_reply::reply_variants;
use crate::session::{ConnectionState, Session, SessionStore};
use crate::transport::{InboundEvent, RoomTransport};
use crate::wire::ChatEnvelope;

struct MockGateway {
    fail_ensure: Option<GatewayError>,
    fail_token: Option<GatewayError>,
    reply: Result<String, GatewayError>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            fail_ensure: None,
            fail_token: None,
            reply: Ok("ok".to_string()),
        }
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn ensure_room(&self, _room: &str) -> Result<(), GatewayError> {
        match &self.fail_ensure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn issue_token(&self, _room: &str, _username: &str) -> Result<AccessToken, GatewayError> {
        match &self.fail_token {
            Some(err) => Err(err.clone()),
            None => Ok(AccessToken("test-token".to_string())),
        }
    }

    async fn request_reply(
        &self,
        _room: &str,
        _username: &str,
        _message: &str,
    ) -> Result<String, GatewayError> {
        self.reply.clone()
    }
}

#[derive(Default)]
struct MockTransport {
    fail_connect: Option<ConnectError>,
    fail_broadcast: bool,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    broadcasts: Mutex<Vec<String>>,
}

#[async_trait]
impl RoomTransport for MockTransport {
    async fn connect(&self, _url: &str, _token: &str) -> Result<(), ConnectError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_connect {
            Some(err) => Err(err.clone()),
            None => {
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn broadcast(&self, payload: &str) -> Result<(), SendError> {
        if self.fail_broadcast {
            return Err(SendError::NotConnected);
        }
        self.broadcasts.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockStore {
    record: Mutex<Option<Session>>,
}

#[async_trait]
impl SessionStore for MockStore {
    async fn load(&self) -> Option<Session> {
        self.record.lock().unwrap().clone()
    }

    async fn save(&self, session: &Session) {
        *self.record.lock().unwrap() = Some(session.clone());
    }

    async fn clear(&self) {
        *self.record.lock().unwrap() = None;
    }
}

struct Harness {
    conversation: Arc<Conversation>,
    store: Arc<MockStore>,
    transport: Arc<MockTransport>,
    inbound_tx: mpsc::Sender<InboundEvent>,
}

fn build(gateway: MockGateway, transport: MockTransport, store: MockStore) -> Harness {
    let (inbound_tx, inbound_rx) = mpsc::channel(16);
    let store = Arc::new(store);
    let transport = Arc::new(transport);
    let conversation = Conversation::new(
        ClientConfig::default(),
        Arc::new(gateway),
        transport.clone(),
        store.clone(),
        inbound_rx,
    );
    Harness {
        conversation,
        store,
        transport,
        inbound_tx,
    }
}

fn default_harness() -> Harness {
    build(
        MockGateway::default(),
        MockTransport::default(),
        MockStore::default(),
    )
}

async fn wait_for_replacement(rx: &mut broadcast::Receiver<ConversationEvent>) -> Message {
    loop {
        if let ConversationEvent::MessageReplaced { message, .. } =
            rx.recv().await.expect("event stream open")
        {
            return message;
        }
    }
}

async fn wait_for_append(rx: &mut broadcast::Receiver<ConversationEvent>) -> Message {
    loop {
        if let ConversationEvent::MessageAppended(message) =
            rx.recv().await.expect("event stream open")
        {
            return message;
        }
    }
}

#[tokio::test]
async fn connect_then_disconnect_ends_idle_with_empty_log() {
    let h = default_harness();

    h.conversation.connect("lobby", "alice").await.unwrap();
    assert_eq!(h.conversation.state().await, ConnectionState::Connected);
    assert_eq!(
        h.store.load().await,
        Some(Session::new("alice", "lobby")),
        "exactly one session record matching the supplied credentials"
    );

    h.conversation.disconnect().await;
    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
    assert!(h.conversation.messages().await.is_empty());
    assert_eq!(h.store.load().await, None);
}

#[tokio::test]
async fn failed_room_creation_surfaces_error_and_persists_nothing() {
    let h = build(
        MockGateway {
            fail_ensure: Some(GatewayError::ServerError(500)),
            ..MockGateway::default()
        },
        MockTransport::default(),
        MockStore::default(),
    );

    let err = h.conversation.connect("lobby", "alice").await.unwrap_err();
    assert!(err.is_gateway());
    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
    assert!(h.conversation.last_error().await.is_some());
    assert_eq!(h.store.load().await, None);
    // Short-circuit: the transport was never touched.
    assert_eq!(h.transport.connect_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn token_failure_short_circuits_before_transport() {
    let h = build(
        MockGateway {
            fail_token: Some(GatewayError::NoResponse),
            ..MockGateway::default()
        },
        MockTransport::default(),
        MockStore::default(),
    );

    assert!(h.conversation.connect("lobby", "alice").await.is_err());
    assert_eq!(h.transport.connect_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
}

#[tokio::test]
async fn transport_failure_tears_down_partial_connection() {
    let h = build(
        MockGateway::default(),
        MockTransport {
            fail_connect: Some(ConnectError::Auth("bad token".into())),
            ..MockTransport::default()
        },
        MockStore::default(),
    );

    assert!(h.conversation.connect("lobby", "alice").await.is_err());
    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
    assert_eq!(h.store.load().await, None);
    assert!(
        h.transport.disconnect_calls.load(Ordering::SeqCst) >= 1,
        "a partially connected adapter must be disconnected before failure is reported"
    );
}

#[tokio::test]
async fn connect_while_connected_is_a_noop() {
    let h = default_harness();

    h.conversation.connect("lobby", "alice").await.unwrap();
    h.conversation.connect("other", "bob").await.unwrap();

    assert_eq!(h.transport.connect_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.conversation.session().await,
        Some(Session::new("alice", "lobby"))
    );
}

#[tokio::test]
async fn send_while_idle_fails_and_leaves_log_unchanged() {
    let h = default_harness();

    let err = h.conversation.send_message("hi").await.unwrap_err();
    assert_eq!(err, SendError::NotConnected);
    assert!(h.conversation.messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn quick_reply_echo_then_canned_assistant_message() {
    let h = default_harness();
    h.conversation.connect("lobby", "alice").await.unwrap();
    let mut events = h.conversation.subscribe();

    h.conversation.send_message("hi").await.unwrap();

    // Before the delay elapses the log holds the echo and the placeholder.
    let log = h.conversation.messages().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "hi");
    assert_eq!(log[0].origin, MessageOrigin::LocalUser);
    assert!(log[1].transient);

    let reply = wait_for_replacement(&mut events).await;
    assert_eq!(reply.origin, MessageOrigin::Assistant);
    assert!(reply_variants("hi").unwrap().contains(&reply.content.as_str()));

    let log = h.conversation.messages().await;
    assert_eq!(log.len(), 2, "placeholder must not remain in the final log");
    assert!(log.iter().all(|m| !m.transient));
    // The broadcast carried the chat envelope.
    let broadcasts = h.transport.broadcasts.lock().unwrap();
    assert_eq!(broadcasts[0], ChatEnvelope::chat("hi").to_json());
}

#[tokio::test]
async fn unmatched_send_falls_through_to_gateway() {
    let h = default_harness();
    h.conversation.connect("lobby", "alice").await.unwrap();
    let mut events = h.conversation.subscribe();

    h.conversation.send_message("asdlkfjasldkf").await.unwrap();

    let log = h.conversation.messages().await;
    assert_eq!(log.len(), 2);
    assert!(log[1].transient, "placeholder precedes the gateway reply");

    let reply = wait_for_replacement(&mut events).await;
    assert_eq!(reply.origin, MessageOrigin::Assistant);
    assert_eq!(reply.content, "ok");

    let log = h.conversation.messages().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].content, "asdlkfjasldkf");
    assert_eq!(log[1].content, "ok");
    assert!(log.iter().all(|m| !m.transient));
}

#[tokio::test]
async fn gateway_timeout_becomes_a_system_message() {
    let h = build(
        MockGateway {
            reply: Err(GatewayError::NoResponse),
            ..MockGateway::default()
        },
        MockTransport::default(),
        MockStore::default(),
    );
    h.conversation.connect("lobby", "alice").await.unwrap();
    let mut events = h.conversation.subscribe();

    h.conversation.send_message("zzzzqqqq").await.unwrap();
    let notice = wait_for_replacement(&mut events).await;
    assert_eq!(notice.origin, MessageOrigin::System);

    let log = h.conversation.messages().await;
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|m| m.origin != MessageOrigin::Assistant));
    assert!(log.iter().all(|m| !m.transient));
}

#[tokio::test]
async fn broadcast_failure_reports_but_keeps_the_echo() {
    let h = build(
        MockGateway::default(),
        MockTransport {
            fail_broadcast: true,
            ..MockTransport::default()
        },
        MockStore::default(),
    );
    h.conversation.connect("lobby", "alice").await.unwrap();

    h.conversation.send_message("asdlkfjasldkf").await.unwrap();

    let log = h.conversation.messages().await;
    assert_eq!(log[0].content, "asdlkfjasldkf");
    assert_eq!(log[0].origin, MessageOrigin::LocalUser);
    assert!(h.conversation.last_error().await.is_some());
}

#[tokio::test]
async fn double_disconnect_is_idempotent() {
    let h = default_harness();
    h.conversation.connect("lobby", "alice").await.unwrap();

    h.conversation.disconnect().await;
    h.conversation.disconnect().await;

    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
    assert_eq!(h.transport.disconnect_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_suppresses_a_pending_quick_reply() {
    let h = default_harness();
    h.conversation.connect("lobby", "alice").await.unwrap();

    h.conversation.send_message("hi").await.unwrap();
    h.conversation.disconnect().await;

    // Give the cancelled completion plenty of (virtual) time to fire.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        h.conversation.messages().await.is_empty(),
        "no stale completion may be written into a torn-down log"
    );
}

#[tokio::test]
async fn inbound_events_become_remote_and_assistant_messages() {
    let h = default_harness();
    h.conversation.connect("lobby", "alice").await.unwrap();
    let mut events = h.conversation.subscribe();

    h.inbound_tx
        .send(InboundEvent {
            sender: "bob".to_string(),
            payload: ChatEnvelope::chat("hey alice").to_json(),
        })
        .await
        .unwrap();
    let peer = wait_for_append(&mut events).await;
    assert_eq!(peer.origin, MessageOrigin::RemotePeer);
    assert_eq!(peer.sender, "bob");
    assert_eq!(peer.content, "hey alice");

    h.inbound_tx
        .send(InboundEvent {
            sender: ASSISTANT_IDENTITY.to_string(),
            payload: "bare reply text".to_string(),
        })
        .await
        .unwrap();
    let assistant = wait_for_append(&mut events).await;
    assert_eq!(assistant.origin, MessageOrigin::Assistant);
    assert_eq!(assistant.content, "bare reply text");
}

#[tokio::test]
async fn restore_rejoins_with_the_persisted_session() {
    let store = MockStore::default();
    *store.record.lock().unwrap() = Some(Session::new("alice", "lobby"));
    let h = build(MockGateway::default(), MockTransport::default(), store);

    assert!(h.conversation.restore().await.unwrap());
    assert_eq!(h.conversation.state().await, ConnectionState::Connected);
    assert_eq!(
        h.conversation.session().await,
        Some(Session::new("alice", "lobby"))
    );
}

#[tokio::test]
async fn restore_without_a_record_is_a_noop() {
    let h = default_harness();
    assert!(!h.conversation.restore().await.unwrap());
    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
}

#[tokio::test]
async fn restore_failure_behaves_like_a_fresh_failed_connect() {
    let store = MockStore::default();
    *store.record.lock().unwrap() = Some(Session::new("alice", "lobby"));
    let h = build(
        MockGateway {
            fail_ensure: Some(GatewayError::NoResponse),
            ..MockGateway::default()
        },
        MockTransport::default(),
        store,
    );

    assert!(h.conversation.restore().await.is_err());
    assert_eq!(h.conversation.state().await, ConnectionState::Idle);
    assert_eq!(h.store.load().await, None, "no retry loop: the record is gone");
}
