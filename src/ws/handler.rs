//! WebSocket upgrade handler for chat bridges and overlays

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Shared bridge secret
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    if !token_matches(state.config.bridge_token.as_deref(), query.token.as_deref()) {
        warn!("WebSocket upgrade rejected, bad bridge token");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

/// An unset token leaves the endpoint open
fn token_matches(expected: Option<&str>, provided: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => provided == Some(expected),
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, connection_id: Uuid, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        channel: state.config.channel.clone(),
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        return;
    }

    let updates_rx = state.round.subscribe();
    run_session(connection_id, &state, ws_sink, ws_stream, updates_rx).await;

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut updates_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    // Replies meant for this connection only (pongs)
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Writer task: round updates and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                update = updates_rx.recv() => match update {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            connection_id = %connection_id,
                            lagged_count = n,
                            "Connection lagged, skipping {} updates", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(connection_id = %connection_id, "Update channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> dispatcher -> round
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(connection_id = %connection_id, "Rate limited inbound message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Chat {
                        text,
                        user,
                        self_echo,
                    }) => {
                        let Some(command) = state.dispatcher.dispatch(&text, &user, self_echo)
                        else {
                            continue;
                        };
                        if !state.round.send(command).await {
                            error!(connection_id = %connection_id, "Round task is gone");
                            break;
                        }
                    }
                    Ok(ClientMsg::Ping { t }) => {
                        if reply_tx.send(ServerMsg::Pong { t }).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                        let _ = reply_tx
                            .send(ServerMsg::Error {
                                code: "bad_message".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(connection_id = %connection_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_when_no_token_is_configured() {
        assert!(token_matches(None, None));
        assert!(token_matches(None, Some("anything")));
    }

    #[test]
    fn configured_token_must_match() {
        assert!(token_matches(Some("s3cret"), Some("s3cret")));
        assert!(!token_matches(Some("s3cret"), Some("guess")));
        assert!(!token_matches(Some("s3cret"), None));
    }

    #[test]
    fn chat_message_wire_format() {
        let raw = r#"{"type":"chat","text":"!drop","user":{"username":"alice","id":42,"badges":["moderator"]}}"#;
        match serde_json::from_str::<ClientMsg>(raw).unwrap() {
            ClientMsg::Chat {
                text,
                user,
                self_echo,
            } => {
                assert_eq!(text, "!drop");
                assert_eq!(user.id, 42);
                assert!(user.has_badge("moderator"));
                assert!(!self_echo);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn say_message_wire_format() {
        let msg = ServerMsg::Say {
            channel: "streamer".into(),
            message: "hi".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "say");
        assert_eq!(json["channel"], "streamer");
    }
}
