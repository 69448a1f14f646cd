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
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{InputEvent, Outbound, PlayerInput};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ProtocolError, ServerMsg};

/// Why an inbound text frame was dropped
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid message: {0}")]
    Invalid(#[from] ProtocolError),
}

/// Decode and validate one client text frame
pub fn parse_client_msg(text: &str) -> Result<ClientMsg, InboundError> {
    let msg: ClientMsg = serde_json::from_str(text)?;
    msg.validate()?;
    Ok(msg)
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    debug!(player_id = %player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before announcing so nothing addressed to us is missed
    let outbound_rx = state.session.subscribe();

    let welcome = ServerMsg::Welcome {
        id: player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let input_tx = state.session.input_tx.clone();
    if input_tx
        .send(PlayerInput::new(player_id, InputEvent::Connect, unix_millis()))
        .await
        .is_err()
    {
        error!(player_id = %player_id, "Session is not running");
        return;
    }

    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    run_connection(player_id, ws_sink, ws_stream, input_tx, outbound_rx, rate_limiter).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the connection with read/write split
async fn run_connection(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut outbound_rx: broadcast::Receiver<Outbound>,
    rate_limiter: ConnectionRateLimiter,
) {
    // Writer task: session broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(Outbound { to, msg }) => {
                    if !to.includes(player_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id = %player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Outbound channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match parse_client_msg(&text) {
                    Ok(client_msg) => {
                        let input = PlayerInput::new(
                            player_id,
                            InputEvent::Message(client_msg),
                            unix_millis(),
                        );
                        if input_tx.send(input).await.is_err() {
                            debug!(player_id = %player_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Dropped client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    let _ = input_tx
        .send(PlayerInput::new(player_id, InputEvent::Disconnect, unix_millis()))
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
