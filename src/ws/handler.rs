use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use crate::models::{ClientMessage, ErrorMessage, ServerMessage, SyncError};
use crate::ws::session::{LiveRoom, SessionCtx};
use crate::AppState;

type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// WebSocket handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    debug!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle one sync connection: dispatch inbound messages, forward room
/// broadcasts, and leave the room on socket close.
async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let mut session = SessionCtx::new();
    info!(
        "WebSocket connection established, connection_id: {}",
        session.connection_id
    );

    // The sink is shared between this loop and the broadcast forwarder
    let (sender, mut receiver) = socket.split();
    let sender: SocketSink = Arc::new(Mutex::new(sender));

    while let Some(Ok(frame)) = receiver.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Ping/pong and binary frames carry no protocol messages
            _ => continue,
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(e) => {
                error!(
                    "Failed to parse message from {}: {}",
                    session.connection_id, e
                );
                send_error_text(&sender, "Invalid message format", None).await;
                continue;
            }
        };

        match client_msg {
            ClientMessage::JoinRoom(join) => {
                // A second join implicitly leaves the previous room first
                if let Some(live) = session.live.take() {
                    detach(&app_state, live, &session).await;
                }

                match app_state
                    .registry
                    .join(
                        &join.identifier,
                        join.creator_secret.as_deref(),
                        session.connection_id,
                    )
                    .await
                {
                    Ok(joined) => {
                        let forward = tokio::spawn(forward_broadcasts(joined.rx, sender.clone()));
                        send_message(&sender, &ServerMessage::RoomData(joined.snapshot)).await;
                        info!(
                            "Connection {} joined room {} as {}",
                            session.connection_id,
                            join.identifier,
                            if joined.is_creator { "creator" } else { "viewer" }
                        );
                        session.live = Some(LiveRoom {
                            room: joined.room,
                            is_creator: joined.is_creator,
                            forward,
                        });
                    }
                    Err(e) => send_error(&sender, &e).await,
                }
            }
            ClientMessage::ClientEdit(edit) => match &session.live {
                Some(live) => {
                    let result = app_state
                        .registry
                        .edit(&live.room, live.is_creator, &edit.identifier, &edit.full_text)
                        .await;
                    if let Err(e) = result {
                        send_error(&sender, &e).await;
                    }
                }
                None => send_error(&sender, &SyncError::NotInRoom).await,
            },
            ClientMessage::LeaveRoom => {
                if let Some(live) = session.live.take() {
                    detach(&app_state, live, &session).await;
                }
            }
        }
    }

    // Socket closed or errored: implicit leave
    if let Some(live) = session.live.take() {
        detach(&app_state, live, &session).await;
    }
    info!(
        "WebSocket connection terminated, connection_id: {}",
        session.connection_id
    );
}

/// Stop forwarding broadcasts and run the registry leave path
async fn detach(app_state: &Arc<AppState>, live: LiveRoom, session: &SessionCtx) {
    live.forward.abort();
    app_state
        .registry
        .leave(&live.room, session.connection_id, live.is_creator)
        .await;
}

/// Forward room broadcasts to one socket until it closes or the room goes
/// away. A lagged receiver skips to the newest edits; full-replace
/// semantics make the intermediate ones redundant.
async fn forward_broadcasts(
    mut rx: broadcast::Receiver<ServerMessage>,
    sender: SocketSink,
) {
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to serialize broadcast: {}", e);
                        continue;
                    }
                };
                if sender.lock().await.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Broadcast receiver lagged, skipped {} messages", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send_message(sender: &SocketSink, msg: &ServerMessage) {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return;
        }
    };
    if sender.lock().await.send(Message::Text(text)).await.is_err() {
        debug!("Socket went away while sending");
    }
}

/// Errors never terminate the connection; the session stays usable
async fn send_error(sender: &SocketSink, error: &SyncError) {
    send_error_text(sender, &error.to_string(), Some(error.code())).await;
}

async fn send_error_text(sender: &SocketSink, message: &str, code: Option<&str>) {
    send_message(
        sender,
        &ServerMessage::Error(ErrorMessage {
            message: message.to_string(),
            code: code.map(str::to_string),
        }),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memstore::{seeded_clip, MemStore};
    use crate::models::{RoomDataMessage, ServerEditMessage};
    use crate::services::secret_service;
    use crate::ws::registry::RoomRegistry;
    use axum::{routing::get, Router};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    const CLIP_ID: &str = "4821";

    async fn serve_app(store: Arc<MemStore>) -> String {
        let config = Config::default();
        let registry = Arc::new(RoomRegistry::new(
            store,
            config.debounce(),
            config.max_clip_bytes,
        ));
        let app_state = Arc::new(AppState { config, registry });
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(app_state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{}/ws", addr)
    }

    async fn recv_server_message(
        socket: &mut (impl StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
                  + Unpin),
    ) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("timed out waiting for server message")
                .expect("socket closed")
                .expect("socket error");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    fn expect_room_data(msg: ServerMessage) -> RoomDataMessage {
        match msg {
            ServerMessage::RoomData(data) => data,
            other => panic!("expected room-data, got {:?}", other),
        }
    }

    fn expect_server_edit(msg: ServerMessage) -> ServerEditMessage {
        match msg {
            ServerMessage::ServerEdit(edit) => edit,
            other => panic!("expected server-edit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn join_edit_broadcast_over_real_sockets() {
        let secret = secret_service::issue_secret();
        let hash = secret_service::hash_secret(&secret).unwrap();
        let store = Arc::new(MemStore::new());
        store.seed(seeded_clip(CLIP_ID, "hello", &hash));
        let url = serve_app(store).await;

        let (mut creator, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let (mut viewer, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

        creator
            .send(WsMessage::Text(
                format!(
                    r#"{{"type":"join-room","identifier":"{}","creatorSecret":"{}"}}"#,
                    CLIP_ID, secret
                )
                .into(),
            ))
            .await
            .unwrap();
        let data = expect_room_data(recv_server_message(&mut creator).await);
        assert!(data.is_creator);
        assert_eq!(data.content, "hello");

        viewer
            .send(WsMessage::Text(
                format!(r#"{{"type":"join-room","identifier":"{}"}}"#, CLIP_ID).into(),
            ))
            .await
            .unwrap();
        let data = expect_room_data(recv_server_message(&mut viewer).await);
        assert!(!data.is_creator);

        creator
            .send(WsMessage::Text(
                format!(
                    r#"{{"type":"client-edit","identifier":"{}","fullText":"hello world","clientTimestamp":1}}"#,
                    CLIP_ID
                )
                .into(),
            ))
            .await
            .unwrap();

        // Both the viewer and the editing creator get the canonical edit
        let edit = expect_server_edit(recv_server_message(&mut viewer).await);
        assert_eq!(edit.full_text, "hello world");
        assert!(edit.server_timestamp > 0);
        let echo = expect_server_edit(recv_server_message(&mut creator).await);
        assert_eq!(echo.full_text, "hello world");
    }

    #[tokio::test]
    async fn rejected_edit_leaves_connection_usable() {
        let secret = secret_service::issue_secret();
        let hash = secret_service::hash_secret(&secret).unwrap();
        let store = Arc::new(MemStore::new());
        store.seed(seeded_clip(CLIP_ID, "hello", &hash));
        let url = serve_app(store).await;

        let (mut viewer, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        viewer
            .send(WsMessage::Text(
                format!(r#"{{"type":"join-room","identifier":"{}"}}"#, CLIP_ID).into(),
            ))
            .await
            .unwrap();
        expect_room_data(recv_server_message(&mut viewer).await);

        viewer
            .send(WsMessage::Text(
                format!(
                    r#"{{"type":"client-edit","identifier":"{}","fullText":"hijack"}}"#,
                    CLIP_ID
                )
                .into(),
            ))
            .await
            .unwrap();
        match recv_server_message(&mut viewer).await {
            ServerMessage::Error(err) => {
                assert_eq!(err.code.as_deref(), Some("unauthorized"));
            }
            other => panic!("expected error, got {:?}", other),
        }

        // Still joined: a leave followed by a rejoin works on the same socket
        viewer
            .send(WsMessage::Text(r#"{"type":"leave-room"}"#.into()))
            .await
            .unwrap();
        viewer
            .send(WsMessage::Text(
                format!(r#"{{"type":"join-room","identifier":"{}"}}"#, CLIP_ID).into(),
            ))
            .await
            .unwrap();
        let data = expect_room_data(recv_server_message(&mut viewer).await);
        assert_eq!(data.content, "hello");
    }

    #[tokio::test]
    async fn join_unknown_clip_reports_not_found() {
        let store = Arc::new(MemStore::new());
        let url = serve_app(store).await;

        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        socket
            .send(WsMessage::Text(
                r#"{"type":"join-room","identifier":"9999"}"#.into(),
            ))
            .await
            .unwrap();
        match recv_server_message(&mut socket).await {
            ServerMessage::Error(err) => {
                assert_eq!(err.code.as_deref(), Some("not-found"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
}
