//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::{AppState, SessionInfo};
use crate::game::{WorldHandle, WorldInput};
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::SessionError;

/// Longest display name kept, in characters
const MAX_NAME_CHARS: usize = 32;
/// Direct replies (pongs) waiting for the writer
const DIRECT_CHANNEL_CAPACITY: usize = 32;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name; a generated one when absent
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let avatar_id = Uuid::new_v4();
    let display_name = display_name_for(avatar_id, query.name.as_deref());
    info!(avatar_id = %avatar_id, %display_name, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, avatar_id, display_name, state))
}

/// Trimmed, length-capped name, or `Player_<id prefix>`
fn display_name_for(avatar_id: Uuid, requested: Option<&str>) -> String {
    let trimmed: String = requested
        .map(str::trim)
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();

    if trimmed.is_empty() {
        format!("Player_{}", &avatar_id.simple().to_string()[..8])
    } else {
        trimmed
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, avatar_id: Uuid, display_name: String, state: AppState) {
    info!(avatar_id = %avatar_id, "New WebSocket connection");

    state.sessions.insert(
        avatar_id,
        SessionInfo {
            display_name: display_name.clone(),
            connected_at: unix_millis(),
        },
    );

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before joining so nothing broadcast after the spawn is missed
    let events_rx = state.world.subscribe();

    match state.world.join(avatar_id, display_name).await {
        Ok(ack) => {
            let welcome = ack.into_welcome(avatar_id);
            match send_msg(&mut ws_sink, &welcome).await {
                Ok(()) => {
                    let limiter = InputRateLimiter::new(state.config.input_rate_limit);
                    run_session(avatar_id, ws_sink, ws_stream, &state.world, events_rx, limiter)
                        .await;
                }
                Err(e) => {
                    error!(avatar_id = %avatar_id, error = %e, "Failed to send welcome");
                    leave_world(&state.world, avatar_id).await;
                }
            }
        }
        Err(e) => {
            warn!(avatar_id = %avatar_id, error = %e, "Join failed");
            let (code, message) = match &e {
                SessionError::JoinRejected(reason) => (reason.code(), reason.to_string()),
                _ => ("unavailable", e.to_string()),
            };
            let _ = send_msg(
                &mut ws_sink,
                &ServerMsg::Error {
                    code: code.to_string(),
                    message,
                },
            )
            .await;
            let _ = ws_sink.close().await;
        }
    }

    // Cleanup on disconnect
    state.sessions.remove(&avatar_id);
    info!(avatar_id = %avatar_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    avatar_id: Uuid,
    mut ws_sink: WsSink,
    mut ws_stream: WsStream,
    world: &WorldHandle,
    mut events_rx: broadcast::Receiver<ServerMsg>,
    rate_limiter: InputRateLimiter,
) {
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_CHANNEL_CAPACITY);

    // Spawn writer task: world broadcasts and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                event = events_rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            avatar_id = %avatar_id,
                            lagged_count = n,
                            "Client lagged, skipping {} messages", n
                        );
                        // Continue - don't disconnect for lag
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(avatar_id = %avatar_id, "World event channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(avatar_id = %avatar_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> world
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(avatar_id = %avatar_id, "Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Ping { t }) => {
                        let pong = ServerMsg::Pong {
                            t,
                            server_time: world.stats().server_time,
                        };
                        if direct_tx.send(pong).await.is_err() {
                            debug!(avatar_id = %avatar_id, "Writer gone");
                            break;
                        }
                    }
                    Ok(ClientMsg::Leave) => {
                        info!(avatar_id = %avatar_id, "Client requested leave");
                        break;
                    }
                    Ok(client_msg) => {
                        let input = WorldInput {
                            avatar_id,
                            msg: client_msg,
                            received_at: unix_millis(),
                        };

                        if world.send_input(input).await.is_err() {
                            debug!(avatar_id = %avatar_id, "World channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(avatar_id = %avatar_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(avatar_id = %avatar_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(avatar_id = %avatar_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(avatar_id = %avatar_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to world loop
    leave_world(world, avatar_id).await;

    // Abort writer task
    writer_handle.abort();
}

async fn leave_world(world: &WorldHandle, avatar_id: Uuid) {
    let leave = WorldInput {
        avatar_id,
        msg: ClientMsg::Leave,
        received_at: unix_millis(),
    };
    if let Err(e) = world.send_input(leave).await {
        debug!(avatar_id = %avatar_id, error = %e, "Could not deliver leave");
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), SessionError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| SessionError::Send(e.to_string()))
}
