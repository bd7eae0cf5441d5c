//! Conversation aggregator
//!
//! Derives a per-account inbox from the flat message log. Recomputed on
//! every request; threads whose counterpart is no longer viewable are
//! dropped from the result but their messages are kept.

use std::collections::HashSet;
use std::sync::Arc;

use super::gate::AuthorizationGate;
use super::message_log::MessageLog;
use crate::data::Message;
use crate::error::AppError;

/// One thread in an inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub counterpart_id: String,
    pub last_message: Message,
    /// Messages from the counterpart not yet seen
    pub unread_count: i64,
    pub total_messages: i64,
}

pub struct ConversationService {
    gate: Arc<AuthorizationGate>,
    log: Arc<MessageLog>,
}

impl ConversationService {
    pub fn new(gate: Arc<AuthorizationGate>, log: Arc<MessageLog>) -> Self {
        Self { gate, log }
    }

    /// Inbox for `account_id`, most recent thread first
    pub async fn list(&self, account_id: &str) -> Result<Vec<ConversationSummary>, AppError> {
        let messages = self.log.involving(account_id).await?;

        let mut seen_counterparts: HashSet<String> = HashSet::new();
        let mut conversations = Vec::new();

        // Newest first, so the first message per counterpart is the latest.
        for message in messages {
            let counterpart = message.counterpart_of(account_id).to_string();
            if !seen_counterparts.insert(counterpart.clone()) {
                continue;
            }

            if !self.gate.can_view_content(account_id, &counterpart).await? {
                tracing::debug!(
                    account = %account_id,
                    counterpart = %counterpart,
                    "Hiding conversation with non-viewable counterpart"
                );
                continue;
            }

            let unread_count = self.log.unread_count(account_id, &counterpart).await?;
            let total_messages = self.log.thread_len(account_id, &counterpart).await?;

            conversations.push(ConversationSummary {
                counterpart_id: counterpart,
                last_message: message,
                unread_count,
                total_messages,
            });
        }

        conversations.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));

        Ok(conversations)
    }

    /// Unread messages across every visible conversation
    pub async fn total_unread(&self, account_id: &str) -> Result<i64, AppError> {
        Ok(self
            .list(account_id)
            .await?
            .iter()
            .map(|conversation| conversation.unread_count)
            .sum())
    }
}
