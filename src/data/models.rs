//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Account
// =============================================================================

/// An account as seen by the relationship graph
///
/// Only identity, display fields and the privacy flag are stored here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    /// Following requires approval and messaging is limited to followers
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Relationship graph
// =============================================================================

/// State of a directed follow edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    /// Awaiting approval by a private account
    Pending,
    /// Confirmed following/follower relationship
    Approved,
}

impl EdgeState {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeState::Pending => "pending",
            EdgeState::Approved => "approved",
        }
    }
}

impl FromStr for EdgeState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EdgeState::Pending),
            "approved" => Ok(EdgeState::Approved),
            other => Err(anyhow::anyhow!("unknown edge state: {other}")),
        }
    }
}

/// Relationship of one account to another, as seen from the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    #[serde(rename = "self")]
    Myself,
    Following,
    Requested,
    NotFollowing,
}

impl FollowStatus {
    /// Derive the status from the edge stored for (actor, target)
    pub fn derive(actor_id: &str, target_id: &str, edge: Option<EdgeState>) -> Self {
        if actor_id == target_id {
            return FollowStatus::Myself;
        }
        match edge {
            Some(EdgeState::Approved) => FollowStatus::Following,
            Some(EdgeState::Pending) => FollowStatus::Requested,
            None => FollowStatus::NotFollowing,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FollowStatus::Myself => "self",
            FollowStatus::Following => "following",
            FollowStatus::Requested => "requested",
            FollowStatus::NotFollowing => "not_following",
        }
    }
}

impl fmt::Display for FollowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an atomic follow insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// A new edge was written in this state
    Created(EdgeState),
    /// An edge for the pair already existed; nothing was written
    Existing(EdgeState),
    /// The followee has no account record
    TargetMissing,
}

/// The four relationship sets of one account
///
/// Projected from the edge table, so every membership here has its
/// mirror in the counterpart's sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSets {
    pub following: HashSet<String>,
    pub followers: HashSet<String>,
    pub sent_requests: HashSet<String>,
    pub follow_requests: HashSet<String>,
}

impl RelationshipSets {
    pub fn is_empty(&self) -> bool {
        self.following.is_empty()
            && self.followers.is_empty()
            && self.sent_requests.is_empty()
            && self.follow_requests.is_empty()
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A one-to-one chat message
///
/// Only `seen` changes after insert, and only from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The other participant, from `account_id`'s point of view
    pub fn counterpart_of(&self, account_id: &str) -> &str {
        if self.sender_id == account_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}
