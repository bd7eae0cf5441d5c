//! Inbox endpoints

use std::collections::HashMap;

use axum::{extract::State, response::Json};

use super::dto::*;
use crate::{AppState, auth::CurrentUser, error::AppError};

/// GET /api/v1/conversations - Caller's inbox, most recent first
pub async fn get_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let summaries = state.conversations.list(user.account_id()).await?;

    let counterpart_ids: Vec<String> = summaries
        .iter()
        .map(|summary| summary.counterpart_id.clone())
        .collect();
    let mut accounts: HashMap<String, _> = state
        .db
        .get_accounts_by_ids(&counterpart_ids)
        .await?
        .into_iter()
        .map(|account| (account.id.clone(), account))
        .collect();

    let mut response = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let online = state.presence.is_online(&summary.counterpart_id).await;
        let counterpart = accounts.remove(&summary.counterpart_id);
        response.push(ConversationResponse::new(summary, counterpart, online));
    }

    Ok(Json(response))
}

/// POST /api/v1/conversations/mark-all-read
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MarkedResponse>, AppError> {
    let marked = state.chat.mark_all_read(user.account_id()).await?;
    Ok(Json(MarkedResponse { marked }))
}

/// GET /api/v1/conversations/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread_count = state.conversations.total_unread(user.account_id()).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
