//! Relationship service
//!
//! Follow, unfollow and request handling over the follow edge table.

use std::sync::Arc;

use crate::data::{
    Account, Database, EdgeState, FollowOutcome, FollowStatus, RelationshipSets,
};
use crate::error::AppError;
use crate::metrics::RELATIONSHIP_MUTATIONS_TOTAL;

/// Result of a follow call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowResult {
    pub status: FollowStatus,
    pub is_private: bool,
}

/// Account with approved edge counts
#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub account: Account,
    pub followers_count: i64,
    pub following_count: i64,
}

/// Relationship service
pub struct RelationshipService {
    db: Arc<Database>,
}

impl RelationshipService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Look up an account, failing with `NotFound` if it has no record
    pub async fn require_account(&self, id: &str) -> Result<Account, AppError> {
        self.db.get_account(id).await?.ok_or(AppError::NotFound)
    }

    /// Follow `target_id`, or request to if the target is private
    ///
    /// # Errors
    /// - `SelfFollow` if actor and target are the same
    /// - `NotFound` if the target has no account
    /// - `AlreadyFollowing` / `RequestAlreadySent` if an edge exists
    pub async fn follow(&self, actor_id: &str, target_id: &str) -> Result<FollowResult, AppError> {
        if actor_id == target_id {
            return Err(AppError::SelfFollow);
        }
        self.require_account(actor_id).await?;

        let result = match self.db.create_follow_edge(actor_id, target_id).await? {
            FollowOutcome::Created(EdgeState::Approved) => FollowResult {
                status: FollowStatus::Following,
                is_private: false,
            },
            FollowOutcome::Created(EdgeState::Pending) => FollowResult {
                status: FollowStatus::Requested,
                is_private: true,
            },
            FollowOutcome::Existing(EdgeState::Approved) => {
                return Err(AppError::AlreadyFollowing);
            }
            FollowOutcome::Existing(EdgeState::Pending) => {
                return Err(AppError::RequestAlreadySent);
            }
            FollowOutcome::TargetMissing => return Err(AppError::NotFound),
        };

        RELATIONSHIP_MUTATIONS_TOTAL
            .with_label_values(&["follow"])
            .inc();
        tracing::info!(
            actor = %actor_id,
            target = %target_id,
            status = %result.status,
            "Follow edge created"
        );

        Ok(result)
    }

    /// Remove the actor's edge to the target and any pending request
    /// between the two. Never fails for a missing edge.
    pub async fn unfollow(&self, actor_id: &str, target_id: &str) -> Result<FollowStatus, AppError> {
        let removed = self.db.remove_follow_edges(actor_id, target_id).await?;

        RELATIONSHIP_MUTATIONS_TOTAL
            .with_label_values(&["unfollow"])
            .inc();
        tracing::info!(actor = %actor_id, target = %target_id, removed, "Unfollowed");

        Ok(FollowStatus::NotFollowing)
    }

    /// Approve a pending request from `requester_id`
    pub async fn accept_request(&self, actor_id: &str, requester_id: &str) -> Result<(), AppError> {
        if !self.db.approve_follow_request(actor_id, requester_id).await? {
            return Err(AppError::NoPendingRequest);
        }

        RELATIONSHIP_MUTATIONS_TOTAL
            .with_label_values(&["accept_request"])
            .inc();
        tracing::info!(actor = %actor_id, requester = %requester_id, "Follow request accepted");

        Ok(())
    }

    /// Drop a pending request from `requester_id`; idempotent
    pub async fn decline_request(&self, actor_id: &str, requester_id: &str) -> Result<(), AppError> {
        let removed = self.db.delete_follow_request(actor_id, requester_id).await?;

        RELATIONSHIP_MUTATIONS_TOTAL
            .with_label_values(&["decline_request"])
            .inc();
        tracing::info!(
            actor = %actor_id,
            requester = %requester_id,
            removed,
            "Follow request declined"
        );

        Ok(())
    }

    /// Remove `follower_id` from the actor's followers; idempotent
    pub async fn remove_follower(&self, actor_id: &str, follower_id: &str) -> Result<(), AppError> {
        let removed = self.db.remove_follower(actor_id, follower_id).await?;

        RELATIONSHIP_MUTATIONS_TOTAL
            .with_label_values(&["remove_follower"])
            .inc();
        tracing::info!(actor = %actor_id, follower = %follower_id, removed, "Follower removed");

        Ok(())
    }

    /// Relationship of actor to target
    pub async fn status(&self, actor_id: &str, target_id: &str) -> Result<FollowStatus, AppError> {
        if actor_id == target_id {
            return Ok(FollowStatus::Myself);
        }
        self.require_account(target_id).await?;

        let edge = self.db.get_edge_state(actor_id, target_id).await?;
        Ok(FollowStatus::derive(actor_id, target_id, edge))
    }

    pub async fn followers(&self, account_id: &str) -> Result<Vec<Account>, AppError> {
        self.require_account(account_id).await?;
        self.db.list_followers(account_id, EdgeState::Approved).await
    }

    pub async fn following(&self, account_id: &str) -> Result<Vec<Account>, AppError> {
        self.require_account(account_id).await?;
        self.db.list_followees(account_id, EdgeState::Approved).await
    }

    /// Pending incoming requests
    pub async fn follow_requests(&self, account_id: &str) -> Result<Vec<Account>, AppError> {
        self.db.list_followers(account_id, EdgeState::Pending).await
    }

    /// Pending outgoing requests
    pub async fn sent_requests(&self, account_id: &str) -> Result<Vec<Account>, AppError> {
        self.db.list_followees(account_id, EdgeState::Pending).await
    }

    pub async fn relationship_sets(&self, account_id: &str) -> Result<RelationshipSets, AppError> {
        self.db.relationship_sets(account_id).await
    }

    pub async fn profile(&self, account_id: &str) -> Result<AccountProfile, AppError> {
        let account = self.require_account(account_id).await?;
        let (followers_count, following_count) = self.db.count_edges(account_id).await?;

        Ok(AccountProfile {
            account,
            followers_count,
            following_count,
        })
    }

    /// Create the caller's account record if it does not exist yet
    ///
    /// Returns the stored record, which is left untouched when present.
    pub async fn provision_account(&self, account: Account) -> Result<Account, AppError> {
        let username = account.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username cannot be empty".to_string()));
        }

        if self.db.insert_account(&account).await? {
            tracing::info!(account = %account.id, username = %account.username, "Account provisioned");
            return Ok(account);
        }

        // The insert is also ignored when another account holds the username.
        self.db
            .get_account(&account.id)
            .await?
            .ok_or_else(|| AppError::Validation("username is already taken".to_string()))
    }

    pub async fn set_private(&self, account_id: &str, is_private: bool) -> Result<Account, AppError> {
        if !self.db.set_account_private(account_id, is_private).await? {
            return Err(AppError::NotFound);
        }

        RELATIONSHIP_MUTATIONS_TOTAL
            .with_label_values(&["set_privacy"])
            .inc();
        tracing::info!(account = %account_id, is_private, "Privacy updated");

        self.require_account(account_id).await
    }
}
