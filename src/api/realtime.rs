//! Realtime WebSocket endpoint
//!
//! One socket per client session. Inbound text frames go to the delivery
//! engine; outbound events are drained from the connection's channel by a
//! writer task.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Json, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::OwnedSemaphorePermit;

use super::dto::OnlineResponse;
use crate::metrics::WS_CONNECTIONS_ACTIVE;
use crate::realtime::RealtimeEngine;
use crate::{AppState, auth::CurrentUser};

/// GET /api/v1/realtime - Upgrade to the realtime event channel
///
/// A connection slot is claimed before the upgrade and held until the
/// socket closes; with none left the handshake gets 503.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Response {
    let slot = match state.realtime.try_reserve() {
        Ok(slot) => slot,
        Err(error) => {
            tracing::warn!(account = %user.account_id(), "Realtime connection cap reached");
            return error.into_response();
        }
    };

    let engine = state.realtime.clone();
    let account_id = user.account_id().to_string();
    ws.on_upgrade(move |socket| serve_connection(socket, engine, account_id, slot))
        .into_response()
}

async fn serve_connection(
    socket: WebSocket,
    engine: Arc<RealtimeEngine>,
    account_id: String,
    _slot: OwnedSemaphorePermit,
) {
    let (connection, mut events) = engine.connect(&account_id).await;
    WS_CONNECTIONS_ACTIVE.inc();

    let (mut sink, mut stream) = socket.split();

    // Ends when the engine drops the connection or the client goes away
    let mut writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(error) => {
                    tracing::error!(%error, "Failed to encode realtime event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        let frame = tokio::select! {
            _ = &mut writer => break,
            frame = stream.next() => frame,
        };
        match frame {
            Some(Ok(WsMessage::Text(text))) => engine.handle_frame(connection, &text).await,
            Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => engine.handle_frame(connection, text).await,
                Err(_) => engine.handle_frame(connection, "").await,
            },
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => {} // ping/pong are answered by the transport
            Some(Err(error)) => {
                tracing::debug!(connection = %connection, %error, "WebSocket receive failed");
                break;
            }
        }
    }

    engine.disconnect(connection).await;
    writer.abort();
    WS_CONNECTIONS_ACTIVE.dec();
}

/// GET /api/v1/online - Accounts currently registered on the realtime channel
pub async fn online_accounts(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Json<OnlineResponse> {
    Json(OnlineResponse {
        online: state.presence.online_accounts().await,
    })
}
