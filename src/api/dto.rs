//! API request and response DTOs
//!
//! All JSON uses camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{Account, FollowStatus, Message};
use crate::service::{AccountProfile, ConversationSummary};

/// Display fields for an account in lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummaryResponse {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub is_private: bool,
}

impl From<Account> for AccountSummaryResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            display_name: account.display_name,
            is_private: account.is_private,
        }
    }
}

/// Account with counts and the caller's relationship to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub is_private: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub status: FollowStatus,
    pub created_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn new(profile: AccountProfile, status: FollowStatus) -> Self {
        Self {
            id: profile.account.id,
            username: profile.account.username,
            display_name: profile.account.display_name,
            is_private: profile.account.is_private,
            followers_count: profile.followers_count,
            following_count: profile.following_count,
            status,
            created_at: profile.account.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub username: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyRequest {
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub status: FollowStatus,
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: FollowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanMessageResponse {
    pub can_message: bool,
    pub is_private: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkedResponse {
    pub marked: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineResponse {
    pub online: Vec<String>,
}

/// One inbox entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub counterpart_id: String,
    /// Missing when the counterpart has no account record
    pub counterpart: Option<AccountSummaryResponse>,
    pub last_message: Message,
    pub unread_count: i64,
    pub total_messages: i64,
    pub online: bool,
}

impl ConversationResponse {
    pub fn new(
        summary: ConversationSummary,
        counterpart: Option<Account>,
        online: bool,
    ) -> Self {
        Self {
            counterpart_id: summary.counterpart_id,
            counterpart: counterpart.map(Into::into),
            last_message: summary.last_message,
            unread_count: summary.unread_count,
            total_messages: summary.total_messages,
            online,
        }
    }
}
