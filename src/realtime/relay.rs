// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WebSocket endpoints: chat relay, signaling relay and the admin broadcast.
//!
//! - `/ws/chat?token=<access token>`: the token is optional. With a valid
//!   token messages are tagged `"<name>: <text>"`; without one they are
//!   relayed verbatim. Every chat connection, the sender included, receives
//!   every message.
//! - `/ws/signaling`: unauthenticated; text and binary frames go verbatim to
//!   every other signaling connection (SDP offers/answers, ICE candidates).

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Query, State,
    },
    http::request::Parts,
    response::Response,
    Json,
};
use futures_util::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use super::registry::{ConnectionId, ConnectionRegistry};
use crate::auth::{AdminOnly, AuthError, TokenPurpose};
use crate::error::{ApiError, ValidJson};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayMode {
    Chat,
    Signaling,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChatQuery {
    /// Optional access token used to label outgoing messages
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResponse {
    /// Number of chat connections the message was queued for
    pub delivered: usize,
}

/// Label for a chat connection, taken from the optional `?token=` access
/// token. Rejects with 401 when a token is present but invalid, so the
/// upgrade never happens.
pub struct ChatLabel(pub String);

impl FromRequestParts<AppState> for ChatLabel {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<ChatQuery>::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::MalformedToken)?;

        match query.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => {
                let claims = state.tokens.verify(token, TokenPurpose::Access)?;
                let label = if claims.name.is_empty() {
                    claims.sub
                } else {
                    claims.name
                };
                Ok(ChatLabel(label))
            }
            _ => Ok(ChatLabel(String::new())),
        }
    }
}

/// Chat relay WebSocket.
#[utoipa::path(
    get,
    path = "/ws/chat",
    tag = "Realtime",
    params(ChatQuery),
    responses(
        (status = 101, description = "Switching to WebSocket"),
        (status = 401, description = "Token supplied but invalid")
    )
)]
pub async fn chat_socket(
    State(state): State<AppState>,
    ChatLabel(label): ChatLabel,
    ws: WebSocketUpgrade,
) -> Response {
    let registry = state.realtime.chat.clone();
    ws.on_upgrade(move |socket| serve_connection(socket, registry, label, RelayMode::Chat))
}

/// WebRTC signaling relay WebSocket.
#[utoipa::path(
    get,
    path = "/ws/signaling",
    tag = "Realtime",
    responses(
        (status = 101, description = "Switching to WebSocket")
    )
)]
pub async fn signaling_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.realtime.signaling.clone();
    ws.on_upgrade(move |socket| serve_connection(socket, registry, String::new(), RelayMode::Signaling))
}

/// Send a server announcement to every chat connection.
#[utoipa::path(
    post,
    path = "/api/broadcast",
    tag = "Realtime",
    request_body = BroadcastRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Message queued", body = BroadcastResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn broadcast(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    ValidJson(req): ValidJson<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    let payload = Message::Text(format!("Broadcast: {message}").into());
    let delivered = state.realtime.chat.broadcast(|_| true, payload).await;
    info!(admin_id = %admin.user_id, delivered, "Admin broadcast sent");

    Ok(Json(BroadcastResponse { delivered }))
}

async fn serve_connection(socket: WebSocket, registry: ConnectionRegistry, label: String, mode: RelayMode) {
    let (id, outbound) = registry.register(label.clone()).await;
    let (sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(forward_outbound(outbound, sink));

    let relay_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
            if let Some(payload) = relay_frame(mode, &label, frame) {
                relay(&relay_registry, mode, id, payload).await;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(id).await;
    debug!(connection_id = id, ?mode, "Connection closed");
}

async fn relay(registry: &ConnectionRegistry, mode: RelayMode, sender: ConnectionId, payload: Message) {
    match mode {
        RelayMode::Chat => registry.broadcast(|_| true, payload).await,
        RelayMode::Signaling => registry.broadcast(|peer| peer.id != sender, payload).await,
    };
}

async fn forward_outbound(
    mut outbound: mpsc::Receiver<Message>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if sink.send(message).await.is_err() || closing {
            break;
        }
    }
}

/// Decide what, if anything, an inbound frame turns into on the relay.
fn relay_frame(mode: RelayMode, label: &str, frame: Message) -> Option<Message> {
    match (mode, frame) {
        (RelayMode::Chat, Message::Text(text)) => {
            Some(Message::Text(format_chat_message(label, text.as_str()).into()))
        }
        (RelayMode::Signaling, frame @ (Message::Text(_) | Message::Binary(_))) => Some(frame),
        _ => None,
    }
}

fn format_chat_message(label: &str, text: &str) -> String {
    if label.is_empty() {
        text.to_string()
    } else {
        format!("{label}: {text}")
    }
}
