//! Account and relationship endpoints

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::Utc;

use super::dto::*;
use crate::data::{Account, FollowStatus};
use crate::{AppState, auth::CurrentUser, error::AppError};

/// POST /api/v1/accounts - Provision the caller's account record
///
/// Idempotent: an existing record is returned unchanged.
pub async fn create_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    let now = Utc::now();
    let account = Account {
        id: user.account_id().to_string(),
        username: request.username.trim().to_string(),
        display_name: request.display_name,
        is_private: request.is_private,
        created_at: now,
        updated_at: now,
    };

    let account = state.relationships.provision_account(account).await?;
    let profile = state.relationships.profile(&account.id).await?;

    Ok(Json(AccountResponse::new(profile, FollowStatus::Myself)))
}

/// GET /api/v1/accounts/:id - Account with counts and relationship status
pub async fn get_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let profile = state.relationships.profile(&id).await?;
    let status = state.relationships.status(user.account_id(), &id).await?;

    Ok(Json(AccountResponse::new(profile, status)))
}

/// PUT /api/v1/accounts/me/privacy - Toggle the caller's privacy flag
pub async fn update_privacy(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<PrivacyRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    state
        .relationships
        .set_private(user.account_id(), request.is_private)
        .await?;
    let profile = state.relationships.profile(user.account_id()).await?;

    Ok(Json(AccountResponse::new(profile, FollowStatus::Myself)))
}

/// POST /api/v1/follow/:id
pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target_id): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    let result = state
        .relationships
        .follow(user.account_id(), &target_id)
        .await?;

    Ok(Json(FollowResponse {
        status: result.status,
        is_private: result.is_private,
    }))
}

/// POST /api/v1/unfollow/:id
///
/// Also cancels an outstanding request in either direction.
pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state
        .relationships
        .unfollow(user.account_id(), &target_id)
        .await?;

    Ok(Json(StatusResponse { status }))
}

/// POST /api/v1/accept-request/:id
pub async fn accept_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(requester_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    state
        .relationships
        .accept_request(user.account_id(), &requester_id)
        .await?;

    // The requester's new relationship to the caller
    Ok(Json(StatusResponse {
        status: FollowStatus::Following,
    }))
}

/// POST /api/v1/decline-request/:id
pub async fn decline_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(requester_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    state
        .relationships
        .decline_request(user.account_id(), &requester_id)
        .await?;

    Ok(Json(StatusResponse {
        status: FollowStatus::NotFollowing,
    }))
}

/// GET /api/v1/status/:id
pub async fn status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state
        .relationships
        .status(user.account_id(), &target_id)
        .await?;

    Ok(Json(StatusResponse { status }))
}

/// GET /api/v1/followers/:id
pub async fn followers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<AccountSummaryResponse>>, AppError> {
    let accounts = state.relationships.followers(&id).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// DELETE /api/v1/followers/:id - Remove an approved follower
pub async fn remove_follower(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(follower_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    state
        .relationships
        .remove_follower(user.account_id(), &follower_id)
        .await?;

    Ok(Json(StatusResponse {
        status: FollowStatus::NotFollowing,
    }))
}

/// GET /api/v1/following/:id
pub async fn following(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<AccountSummaryResponse>>, AppError> {
    let accounts = state.relationships.following(&id).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/requests - Pending incoming follow requests
pub async fn follow_requests(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<AccountSummaryResponse>>, AppError> {
    let accounts = state
        .relationships
        .follow_requests(user.account_id())
        .await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/requests/sent - Pending outgoing follow requests
pub async fn sent_requests(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<AccountSummaryResponse>>, AppError> {
    let accounts = state
        .relationships
        .sent_requests(user.account_id())
        .await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/can-message/:id
pub async fn can_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target_id): Path<String>,
) -> Result<Json<CanMessageResponse>, AppError> {
    let access = state.gate.check(user.account_id(), &target_id).await?;

    Ok(Json(CanMessageResponse {
        can_message: access.is_allowed(),
        is_private: access.target_is_private(),
    }))
}
