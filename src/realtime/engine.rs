//! Realtime delivery engine
//!
//! Routes inbound events from long-lived connections. Chat messages are
//! persisted before they are emitted to the room, so every observer sees
//! the stored id and timestamp.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

use super::ConnectionId;
use super::events::{ChatMessagePayload, ClientEvent, PairPayload, ServerEvent, preview, room_key};
use super::presence::PresenceRegistry;
use crate::error::AppError;
use crate::metrics::{
    REALTIME_EVENTS_TOTAL, REALTIME_MALFORMED_EVENTS_TOTAL, REALTIME_STALLED_CONNECTIONS_TOTAL,
};
use crate::service::{ChatService, SendChannel};

struct Connection {
    /// Account the transport authenticated as
    account_id: String,
    sender: Sender<ServerEvent>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Routing {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

/// Connections whose outbound queue was full during a send
type Stalled = Vec<ConnectionId>;

impl Routing {
    /// Queue `event` for one connection; `false` if its queue is full
    fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        let Some(handle) = self.connections.get(&connection) else {
            return true;
        };
        match handle.sender.try_send(event) {
            Err(TrySendError::Full(_)) => false,
            // A closed receiver means the socket is shutting down.
            Ok(()) | Err(TrySendError::Closed(_)) => true,
        }
    }

    fn broadcast_room(&self, room: &str, event: &ServerEvent, except: Option<ConnectionId>) -> Stalled {
        let Some(members) = self.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|member| Some(**member) != except)
            .filter(|member| !self.send_to(**member, event.clone()))
            .copied()
            .collect()
    }

    fn broadcast_all(&self, event: &ServerEvent) -> Stalled {
        self.connections
            .keys()
            .filter(|connection| !self.send_to(**connection, event.clone()))
            .copied()
            .collect()
    }

    /// Drop a connection and its room memberships
    fn remove(&mut self, connection: ConnectionId) -> Option<Connection> {
        let handle = self.connections.remove(&connection)?;
        for room in &handle.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&connection);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(handle)
    }

    fn leave(&mut self, connection: ConnectionId, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
        if let Some(handle) = self.connections.get_mut(&connection) {
            handle.rooms.remove(room);
        }
    }
}

/// Sizing for the engine
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    /// Concurrent connections admitted by [`RealtimeEngine::try_reserve`]
    pub max_connections: usize,
    /// Queued outbound events per connection before it is dropped as stalled
    pub outbound_buffer: usize,
    /// Characters of text carried by a new-message notification
    pub preview_chars: usize,
}

pub struct RealtimeEngine {
    chat: Arc<ChatService>,
    presence: Arc<PresenceRegistry>,
    routing: RwLock<Routing>,
    slots: Arc<Semaphore>,
    next_connection_id: AtomicU64,
    limits: EngineLimits,
}

impl RealtimeEngine {
    pub fn new(chat: Arc<ChatService>, presence: Arc<PresenceRegistry>, limits: EngineLimits) -> Self {
        Self {
            chat,
            presence,
            routing: RwLock::new(Routing::default()),
            slots: Arc::new(Semaphore::new(
                limits.max_connections.min(Semaphore::MAX_PERMITS),
            )),
            next_connection_id: AtomicU64::new(1),
            limits,
        }
    }

    /// Claim a connection slot, released when the permit is dropped
    ///
    /// Must be taken before the upgrade so concurrent handshakes cannot
    /// overshoot the cap.
    pub fn try_reserve(&self) -> Result<OwnedSemaphorePermit, AppError> {
        self.slots.clone().try_acquire_owned().map_err(|_| {
            AppError::ServiceUnavailable(format!(
                "too many realtime connections (max {})",
                self.limits.max_connections
            ))
        })
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub async fn connection_count(&self) -> usize {
        self.routing.read().await.connections.len()
    }

    /// Open a connection for an authenticated account
    ///
    /// The connection starts anonymous; it joins presence only once it
    /// sends `register`.
    ///
    /// The receiver closes if the connection is dropped for not keeping up
    /// with its outbound queue.
    pub async fn connect(&self, account_id: &str) -> (ConnectionId, Receiver<ServerEvent>) {
        let connection = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.limits.outbound_buffer.max(1));

        self.routing.write().await.connections.insert(
            connection,
            Connection {
                account_id: account_id.to_string(),
                sender,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(connection = %connection, account = %account_id, "Connection opened");

        (connection, receiver)
    }

    /// Tear down a connection: leave its rooms, drop presence, and
    /// rebroadcast the online list if it was registered
    pub async fn disconnect(&self, connection: ConnectionId) {
        self.routing.write().await.remove(connection);

        if let Some((account_id, went_offline)) = self.presence.unregister(connection).await {
            tracing::info!(
                connection = %connection,
                account = %account_id,
                went_offline,
                "Registered connection closed"
            );
            self.broadcast_online_users().await;
        } else {
            tracing::debug!(connection = %connection, "Connection closed");
        }
    }

    /// Decode and dispatch one text frame
    ///
    /// Malformed frames and rejected events are answered with an `error`
    /// event; the connection stays open either way.
    pub async fn handle_frame(&self, connection: ConnectionId, frame: &str) {
        let event = match serde_json::from_str::<ClientEvent>(frame) {
            Ok(event) => event,
            Err(error) => {
                REALTIME_MALFORMED_EVENTS_TOTAL.inc();
                tracing::warn!(connection = %connection, %error, "Malformed realtime frame");
                self.send_error(connection, format!("malformed event: {error}"))
                    .await;
                return;
            }
        };

        REALTIME_EVENTS_TOTAL.with_label_values(&[event.name()]).inc();

        if let Err(error) = self.handle_event(connection, event).await {
            tracing::warn!(
                connection = %connection,
                code = error.code(),
                %error,
                "Realtime event rejected"
            );
            self.send_error(connection, error.public_message()).await;
        }
    }

    pub async fn handle_event(&self, connection: ConnectionId, event: ClientEvent) -> Result<(), AppError> {
        match event {
            ClientEvent::Register(account_id) => self.register(connection, &account_id).await,
            ClientEvent::JoinChat(pair) => self.join_chat(connection, &pair).await,
            ClientEvent::LeaveChat(pair) => self.leave_chat(connection, &pair).await,
            ClientEvent::ChatMessage(payload) => self.chat_message(connection, payload).await,
            ClientEvent::Typing(pair) => {
                self.typing(connection, &pair, |sender_id| ServerEvent::Typing { sender_id })
                    .await
            }
            ClientEvent::StopTyping(pair) => {
                self.typing(connection, &pair, |sender_id| ServerEvent::StopTyping { sender_id })
                    .await
            }
        }
    }

    async fn authenticated_account(&self, connection: ConnectionId) -> Result<String, AppError> {
        self.routing
            .read()
            .await
            .connections
            .get(&connection)
            .map(|handle| handle.account_id.clone())
            .ok_or(AppError::Unauthorized)
    }

    /// Events may only speak for the account the connection authenticated as
    async fn require_sender(&self, connection: ConnectionId, sender_id: &str) -> Result<(), AppError> {
        if self.authenticated_account(connection).await? != sender_id {
            return Err(AppError::SenderMismatch);
        }
        Ok(())
    }

    async fn register(&self, connection: ConnectionId, account_id: &str) -> Result<(), AppError> {
        self.require_sender(connection, account_id).await?;
        self.presence.register(connection, account_id).await;
        tracing::info!(connection = %connection, account = %account_id, "Connection registered");

        self.broadcast_online_users().await;
        Ok(())
    }

    async fn join_chat(&self, connection: ConnectionId, pair: &PairPayload) -> Result<(), AppError> {
        self.require_sender(connection, &pair.sender_id).await?;
        if pair.sender_id == pair.receiver_id {
            return Err(AppError::Validation(
                "cannot open a conversation with yourself".to_string(),
            ));
        }
        self.chat
            .access(&pair.sender_id, &pair.receiver_id)
            .await?
            .require()?;

        let room = room_key(&pair.sender_id, &pair.receiver_id);
        let mut routing = self.routing.write().await;
        routing
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection);
        if let Some(handle) = routing.connections.get_mut(&connection) {
            handle.rooms.insert(room.clone());
        }
        tracing::debug!(connection = %connection, room = %room, "Joined chat room");

        Ok(())
    }

    async fn leave_chat(&self, connection: ConnectionId, pair: &PairPayload) -> Result<(), AppError> {
        self.require_sender(connection, &pair.sender_id).await?;

        let room = room_key(&pair.sender_id, &pair.receiver_id);
        self.routing.write().await.leave(connection, &room);
        tracing::debug!(connection = %connection, room = %room, "Left chat room");

        Ok(())
    }

    async fn chat_message(&self, connection: ConnectionId, payload: ChatMessagePayload) -> Result<(), AppError> {
        self.require_sender(connection, &payload.sender_id).await?;

        let message = self
            .chat
            .send(
                &payload.sender_id,
                &payload.receiver_id,
                &payload.text,
                SendChannel::Realtime,
            )
            .await?;

        let receiver_connections = self.presence.connections_of(&message.receiver_id).await;
        let room = room_key(&message.sender_id, &message.receiver_id);

        let routing = self.routing.read().await;
        let mut stalled =
            routing.broadcast_room(&room, &ServerEvent::ChatMessage(message.clone()), None);

        let in_room = routing.rooms.get(&room);
        let notification = ServerEvent::NewMessageNotification {
            sender_id: message.sender_id.clone(),
            text_preview: preview(&message.text, self.limits.preview_chars),
        };
        for receiver_connection in receiver_connections {
            if in_room.is_some_and(|members| members.contains(&receiver_connection)) {
                continue;
            }
            if !routing.send_to(receiver_connection, notification.clone()) {
                stalled.push(receiver_connection);
            }
        }
        drop(routing);

        self.evict(stalled).await;
        Ok(())
    }

    async fn typing<F>(&self, connection: ConnectionId, pair: &PairPayload, event: F) -> Result<(), AppError>
    where
        F: FnOnce(String) -> ServerEvent,
    {
        self.require_sender(connection, &pair.sender_id).await?;

        let room = room_key(&pair.sender_id, &pair.receiver_id);
        let event = event(pair.sender_id.clone());
        let stalled = self
            .routing
            .read()
            .await
            .broadcast_room(&room, &event, Some(connection));

        self.evict(stalled).await;
        Ok(())
    }

    async fn broadcast_online_users(&self) {
        let online = self.presence.online_accounts().await;
        let stalled = self
            .routing
            .read()
            .await
            .broadcast_all(&ServerEvent::OnlineUsers(online));
        self.evict(stalled).await;
    }

    async fn send_error(&self, connection: ConnectionId, message: String) {
        let delivered = self
            .routing
            .read()
            .await
            .send_to(connection, ServerEvent::Error { message });
        if !delivered {
            self.evict(vec![connection]).await;
        }
    }

    /// Drop connections that stopped draining their queue
    ///
    /// Removing the sender closes the socket's writer; the socket task then
    /// runs the regular `disconnect`, which clears presence.
    async fn evict(&self, stalled: Stalled) {
        if stalled.is_empty() {
            return;
        }
        let mut routing = self.routing.write().await;
        for connection in stalled {
            if let Some(handle) = routing.remove(connection) {
                REALTIME_STALLED_CONNECTIONS_TOTAL.inc();
                tracing::warn!(
                    connection = %connection,
                    account = %handle.account_id,
                    "Outbound queue full; dropping connection"
                );
            }
        }
    }
}
