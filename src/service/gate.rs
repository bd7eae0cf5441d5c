//! Authorization gate
//!
//! Decides whether one account may message, or view content from,
//! another. Evaluated on every send and every thread load; decisions
//! are never cached.

use std::sync::Arc;

use crate::data::{Database, EdgeState};
use crate::error::AppError;

/// Outcome of a gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAccess {
    /// Target is public, or the actor is an approved follower
    Allowed { target_is_private: bool },
    /// Target is private and the actor does not follow them
    PrivateAccount,
}

impl MessageAccess {
    /// Pure decision from the target's privacy flag and the actor's edge
    pub fn evaluate(target_is_private: bool, actor_edge: Option<EdgeState>) -> Self {
        if !target_is_private || actor_edge == Some(EdgeState::Approved) {
            MessageAccess::Allowed { target_is_private }
        } else {
            MessageAccess::PrivateAccount
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, MessageAccess::Allowed { .. })
    }

    pub fn target_is_private(self) -> bool {
        match self {
            MessageAccess::Allowed { target_is_private } => target_is_private,
            MessageAccess::PrivateAccount => true,
        }
    }

    /// Turn a denial into `AppError::PrivateAccount`
    pub fn require(self) -> Result<(), AppError> {
        if self.is_allowed() {
            Ok(())
        } else {
            Err(AppError::PrivateAccount)
        }
    }
}

pub struct AuthorizationGate {
    db: Arc<Database>,
}

impl AuthorizationGate {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Evaluate access, or `None` if the target has no account record
    pub async fn access(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<Option<MessageAccess>, AppError> {
        let Some(target) = self.db.get_account(target_id).await? else {
            return Ok(None);
        };
        let edge = self.db.get_edge_state(actor_id, target_id).await?;

        Ok(Some(MessageAccess::evaluate(target.is_private, edge)))
    }

    /// Like [`access`](Self::access) but a missing target is `NotFound`
    pub async fn check(&self, actor_id: &str, target_id: &str) -> Result<MessageAccess, AppError> {
        self.access(actor_id, target_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn can_message(&self, actor_id: &str, target_id: &str) -> Result<bool, AppError> {
        Ok(self.check(actor_id, target_id).await?.is_allowed())
    }

    /// Same rule as messaging. Missing accounts are not viewable.
    pub async fn can_view_content(&self, actor_id: &str, target_id: &str) -> Result<bool, AppError> {
        Ok(self
            .access(actor_id, target_id)
            .await?
            .is_some_and(MessageAccess::is_allowed))
    }
}
