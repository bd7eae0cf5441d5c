//! Chat service
//!
//! Gate-checked messaging operations shared by the HTTP handlers and
//! the realtime engine.

use std::sync::Arc;

use super::gate::{AuthorizationGate, MessageAccess};
use super::message_log::MessageLog;
use crate::data::Message;
use crate::error::AppError;
use crate::metrics::MESSAGES_SENT_TOTAL;

/// Where a send originated, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendChannel {
    Http,
    Realtime,
}

impl SendChannel {
    fn as_str(self) -> &'static str {
        match self {
            SendChannel::Http => "http",
            SendChannel::Realtime => "realtime",
        }
    }
}

pub struct ChatService {
    gate: Arc<AuthorizationGate>,
    log: Arc<MessageLog>,
}

fn reject_self(actor_id: &str, other_id: &str) -> Result<(), AppError> {
    if actor_id == other_id {
        return Err(AppError::Validation(
            "cannot open a conversation with yourself".to_string(),
        ));
    }
    Ok(())
}

impl ChatService {
    pub fn new(gate: Arc<AuthorizationGate>, log: Arc<MessageLog>) -> Self {
        Self { gate, log }
    }

    /// Gate decision for `actor_id` messaging `other_id`
    pub async fn access(&self, actor_id: &str, other_id: &str) -> Result<MessageAccess, AppError> {
        self.gate.check(actor_id, other_id).await
    }

    /// Check authorization, then append
    ///
    /// # Errors
    /// - `NotFound` if the receiver has no account
    /// - `PrivateAccount` if the receiver is private and not followed
    /// - `EmptyMessage` / `Validation` for bad text
    pub async fn send(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
        channel: SendChannel,
    ) -> Result<Message, AppError> {
        reject_self(sender_id, receiver_id)?;
        self.log.validate_text(text)?;
        self.access(sender_id, receiver_id).await?.require()?;

        let message = self.log.append(sender_id, receiver_id, text).await?;

        MESSAGES_SENT_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();
        tracing::debug!(
            message_id = %message.id,
            sender = %sender_id,
            receiver = %receiver_id,
            channel = channel.as_str(),
            "Message appended"
        );

        Ok(message)
    }

    /// Load a thread for display
    ///
    /// Marks messages from `other_id` as seen before returning the full
    /// thread, oldest first.
    pub async fn open_thread(&self, actor_id: &str, other_id: &str) -> Result<Vec<Message>, AppError> {
        reject_self(actor_id, other_id)?;
        self.access(actor_id, other_id).await?.require()?;

        let marked = self.log.mark_seen(actor_id, other_id).await?;
        if marked > 0 {
            tracing::debug!(actor = %actor_id, other = %other_id, marked, "Thread marked seen");
        }

        self.log.find_thread(actor_id, other_id).await
    }

    pub async fn mark_read(&self, actor_id: &str, other_id: &str) -> Result<u64, AppError> {
        self.log.mark_seen(actor_id, other_id).await
    }

    pub async fn mark_all_read(&self, actor_id: &str) -> Result<u64, AppError> {
        let marked = self.log.mark_all_seen(actor_id).await?;
        tracing::debug!(actor = %actor_id, marked, "All conversations marked read");
        Ok(marked)
    }

    pub async fn delete_thread(&self, actor_id: &str, other_id: &str) -> Result<u64, AppError> {
        reject_self(actor_id, other_id)?;

        let deleted = self.log.delete_thread(actor_id, other_id).await?;
        tracing::info!(actor = %actor_id, other = %other_id, deleted, "Thread deleted");

        Ok(deleted)
    }
}
