//! One-to-one chat endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use super::dto::*;
use crate::data::Message;
use crate::service::SendChannel;
use crate::{AppState, auth::CurrentUser, error::AppError};

/// GET /api/v1/chat/:id - Open a thread
///
/// Fails with 403 if the caller may not message the counterpart.
/// Incoming messages are marked seen before the thread is returned.
pub async fn get_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(other_id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    let thread = state.chat.open_thread(user.account_id(), &other_id).await?;
    Ok(Json(thread))
}

/// POST /api/v1/chat/:id/send
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(other_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = state
        .chat
        .send(user.account_id(), &other_id, &request.text, SendChannel::Http)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/chat/:id/read - Mark the counterpart's messages seen
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(other_id): Path<String>,
) -> Result<Json<MarkedResponse>, AppError> {
    let marked = state.chat.mark_read(user.account_id(), &other_id).await?;
    Ok(Json(MarkedResponse { marked }))
}

/// DELETE /api/v1/chat/:id - Delete the whole thread for both sides
pub async fn delete_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(other_id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.chat.delete_thread(user.account_id(), &other_id).await?;
    Ok(Json(DeletedResponse { deleted }))
}
