//! Realtime wire events
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::data::Message;

/// Sender/receiver pair carried by room-scoped events
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairPayload {
    pub sender_id: String,
    pub receiver_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Register(String),
    JoinChat(PairPayload),
    LeaveChat(PairPayload),
    ChatMessage(ChatMessagePayload),
    Typing(PairPayload),
    StopTyping(PairPayload),
}

impl ClientEvent {
    /// Event name, used as a metric label
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register(_) => "register",
            ClientEvent::JoinChat(_) => "joinChat",
            ClientEvent::LeaveChat(_) => "leaveChat",
            ClientEvent::ChatMessage(_) => "chatMessage",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::StopTyping(_) => "stopTyping",
        }
    }
}

/// Events pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full list of registered account ids
    OnlineUsers(Vec<String>),
    /// A persisted message, as stored
    ChatMessage(Message),
    #[serde(rename_all = "camelCase")]
    NewMessageNotification {
        sender_id: String,
        text_preview: String,
    },
    #[serde(rename_all = "camelCase")]
    Typing { sender_id: String },
    #[serde(rename_all = "camelCase")]
    StopTyping { sender_id: String },
    Error { message: String },
}

const ROOM_SEPARATOR: char = ':';

/// Canonical room key for a pair; identical whichever side joins first
pub fn room_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}{ROOM_SEPARATOR}{second}")
}

/// First `max_chars` characters of `text`, cut on a char boundary
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
