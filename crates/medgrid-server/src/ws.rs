//! Live occupancy feed for dashboards.
//!
//! A dashboard opens `/api/ws?token=<jwt>` (or sends a Bearer header), then
//! sends `join-hospital` frames to choose which hospitals it follows. Every
//! committed occupancy change in a joined hospital arrives as an
//! `occupancy-changed` text frame.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{Sink, SinkExt, StreamExt};
use medgrid_api::ApiError;
use medgrid_auth::AuthContext;
use medgrid_notifications::{ClientMessage, Notification, ServerMessage, SessionHandle};
use serde::{Deserialize, Serialize};

use crate::handlers::AppQuery;
use crate::middleware::bearer_token;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    /// Browsers cannot set headers on a socket upgrade, so the token may ride
    /// in the query string instead.
    pub token: Option<String>,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<FeedParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = match params.token {
        Some(token) => token,
        None => bearer_token(&headers)?
            .map(str::to_owned)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?,
    };
    let context = state.auth.authenticate(&token).map_err(|e| {
        tracing::warn!(error = %e, "occupancy feed auth failed");
        ApiError::from(e)
    })?;

    let session = state.hub.connect();
    let ping_every = state.config.ping_interval();
    Ok(ws.on_upgrade(move |socket| run_session(socket, session, context, ping_every)))
}

async fn run_session(
    socket: WebSocket,
    mut session: SessionHandle,
    context: AuthContext,
    ping_every: std::time::Duration,
) {
    let (mut ws_write, mut ws_read) = socket.split();
    let mut ping = tokio::time::interval(ping_every);
    ping.tick().await;

    tracing::info!(session = ?session.id(), user_id = %context.user_id, "occupancy feed connected");

    loop {
        tokio::select! {
            notification = session.recv() => {
                let Some(notification) = notification else { break };
                if send_events(&mut ws_write, notification).await.is_err() {
                    break;
                }
            }
            incoming = ws_read.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => handle_client_message(&session, text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "occupancy feed read error");
                        break;
                    }
                };
                if send_json(&mut ws_write, &reply).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_write.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(session = ?session.id(), "occupancy feed disconnected");
}

fn handle_client_message(session: &SessionHandle, text: &str) -> ServerMessage {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => return ServerMessage::Error { message: e.to_string() },
    };
    match message {
        ClientMessage::JoinHospital {
            hospital_id,
            department_id,
        } => match session.subscribe(&hospital_id, department_id.as_deref()) {
            Ok(()) => {
                tracing::debug!(session = ?session.id(), hospital_id = %hospital_id, "joined hospital");
                ServerMessage::Joined {
                    hospital_id,
                    department_id,
                }
            }
            Err(e) => ServerMessage::Error { message: e.to_string() },
        },
        ClientMessage::LeaveHospital { hospital_id } => match session.unsubscribe(&hospital_id) {
            Ok(_) => ServerMessage::Left { hospital_id },
            Err(e) => ServerMessage::Error { message: e.to_string() },
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

async fn send_events<S>(sink: &mut S, notification: Notification) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    for event in &notification.events {
        send_json(sink, event).await?;
    }
    Ok(())
}

async fn send_json<S, T>(sink: &mut S, value: &T) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
    T: Serialize,
{
    match serde_json::to_string(value) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize feed frame");
            Ok(())
        }
    }
}
