//! API layer
//!
//! HTTP handlers for:
//! - Accounts and the relationship graph
//! - One-to-one chat and the conversation inbox
//! - The realtime WebSocket channel
//! - Metrics (Prometheus)

mod chat;
mod conversations;
mod dto;
pub mod metrics;
mod realtime;
mod relationships;

pub use dto::*;
pub use metrics::metrics_router;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::AppState;

/// Create the `/api` router
///
/// Every route requires a session; handlers enforce it through the
/// `CurrentUser` extractor.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/v1/accounts", post(relationships::create_account))
        .route("/v1/accounts/me/privacy", put(relationships::update_privacy))
        .route("/v1/accounts/:id", get(relationships::get_account))
        // Relationship graph
        .route("/v1/follow/:id", post(relationships::follow))
        .route("/v1/unfollow/:id", post(relationships::unfollow))
        .route("/v1/accept-request/:id", post(relationships::accept_request))
        .route(
            "/v1/decline-request/:id",
            post(relationships::decline_request),
        )
        .route("/v1/status/:id", get(relationships::status))
        .route(
            "/v1/followers/:id",
            get(relationships::followers).delete(relationships::remove_follower),
        )
        .route("/v1/following/:id", get(relationships::following))
        .route("/v1/requests", get(relationships::follow_requests))
        .route("/v1/requests/sent", get(relationships::sent_requests))
        .route("/v1/can-message/:id", get(relationships::can_message))
        // Chat
        .route(
            "/v1/chat/:id",
            get(chat::get_thread).delete(chat::delete_thread),
        )
        .route("/v1/chat/:id/send", post(chat::send_message))
        .route("/v1/chat/:id/read", post(chat::mark_read))
        // Inbox
        .route("/v1/conversations", get(conversations::get_conversations))
        .route(
            "/v1/conversations/mark-all-read",
            post(conversations::mark_all_read),
        )
        .route(
            "/v1/conversations/unread-count",
            get(conversations::unread_count),
        )
        // Realtime
        .route("/v1/online", get(realtime::online_accounts))
        .route("/v1/realtime", get(realtime::ws_handler))
}
