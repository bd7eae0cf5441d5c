//! Message log
//!
//! Append-only store of one-to-one messages. Does not check
//! authorization; callers go through the gate first.

use std::sync::Arc;

use crate::data::{Database, Message};
use crate::error::AppError;

pub struct MessageLog {
    db: Arc<Database>,
    max_message_chars: usize,
}

impl MessageLog {
    pub fn new(db: Arc<Database>, max_message_chars: usize) -> Self {
        Self {
            db,
            max_message_chars,
        }
    }

    /// Reject text that is blank after trimming or over the length limit
    pub fn validate_text(&self, text: &str) -> Result<(), AppError> {
        if text.trim().is_empty() {
            return Err(AppError::EmptyMessage);
        }
        if text.chars().count() > self.max_message_chars {
            return Err(AppError::Validation(format!(
                "message text cannot exceed {} characters",
                self.max_message_chars
            )));
        }
        Ok(())
    }

    /// Persist a message and return it with its server-assigned id and time
    pub async fn append(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, AppError> {
        self.validate_text(text)?;
        self.db.insert_message(sender_id, receiver_id, text).await
    }

    /// All messages between `a` and `b`, oldest first
    pub async fn find_thread(&self, a: &str, b: &str) -> Result<Vec<Message>, AppError> {
        self.db.get_thread(a, b).await
    }

    /// Flip `seen` on everything `sender_id` sent to `receiver_id`
    pub async fn mark_seen(&self, receiver_id: &str, sender_id: &str) -> Result<u64, AppError> {
        self.db.mark_thread_seen(receiver_id, sender_id).await
    }

    pub async fn mark_all_seen(&self, receiver_id: &str) -> Result<u64, AppError> {
        self.db.mark_all_seen(receiver_id).await
    }

    pub async fn delete_thread(&self, a: &str, b: &str) -> Result<u64, AppError> {
        self.db.delete_thread(a, b).await
    }

    /// Messages sent or received by `account_id`, newest first
    pub async fn involving(&self, account_id: &str) -> Result<Vec<Message>, AppError> {
        self.db.get_messages_involving(account_id).await
    }

    pub async fn unread_count(&self, receiver_id: &str, sender_id: &str) -> Result<i64, AppError> {
        self.db.count_unread(receiver_id, sender_id).await
    }

    pub async fn thread_len(&self, a: &str, b: &str) -> Result<i64, AppError> {
        self.db.count_thread(a, b).await
    }
}
