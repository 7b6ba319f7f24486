//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{WorldCommand, WorldHandle};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// WebSocket upgrade handler; every connection becomes a new player
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, session_id: Uuid, state: AppState) {
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe first so no snapshot containing the new player is missed
    let snapshot_rx = state.world.subscribe();

    if !state.world.send(WorldCommand::Join { session_id }).await {
        error!(session_id = %session_id, "World is not running, dropping connection");
        return;
    }
    state.sessions.insert(session_id);

    let welcome = ServerMsg::Welcome {
        id: session_id.to_string(),
        server_time: unix_millis(),
    };

    match greet(&mut ws_sink, &welcome, &state.map_message).await {
        Ok(()) => run_session(session_id, ws_sink, ws_stream, &state.world, snapshot_rx).await,
        Err(e) => error!(session_id = %session_id, error = %e, "Failed to send greeting"),
    }

    // Cleanup on disconnect
    state.world.send(WorldCommand::Leave { session_id }).await;
    let connected_ms = state
        .sessions
        .remove(&session_id)
        .map(|info| unix_millis().saturating_sub(info.connected_at))
        .unwrap_or(0);

    info!(session_id = %session_id, connected_ms, "WebSocket connection closed");
}

/// Welcome first, then the map
async fn greet(sink: &mut WsSink, welcome: &ServerMsg, map_message: &str) -> Result<(), String> {
    send_msg(sink, welcome).await?;
    sink.send(Message::Text(map_message.to_owned()))
        .await
        .map_err(|e| e.to_string())
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: Uuid,
    mut ws_sink: WsSink,
    mut ws_stream: WsStream,
    world: &WorldHandle,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Spawn writer task: broadcast snapshots -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        session_id = %session_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> tick task
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                let command = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Inputs(input)) => WorldCommand::Input { session_id, input },
                    Ok(ClientMsg::Snowball { angle }) => WorldCommand::Throw { session_id, angle },
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if !world.send(command).await {
                    debug!(session_id = %session_id, "Command channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
