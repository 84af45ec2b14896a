use crate::relay::RelayCommand;
use crate::signaling::SignalingService;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkie_core::{ClientMessage, ParticipantId, ServerMessage};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ParticipantId::generate(), service))
}

async fn handle_socket(socket: WebSocket, conn: ParticipantId, service: SignalingService) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.add_connection(conn.clone(), tx);
    info!(
        "New WebSocket connection: {} ({} open)",
        conn,
        service.connection_count()
    );
    service.send_signal(&conn, &ServerMessage::Welcome { id: conn.clone() });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let conn = conn.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            let cmd = RelayCommand::Inbound {
                                conn: conn.clone(),
                                message,
                            };
                            if !service.relay().send(cmd).await {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid message from {}: {}", conn, e),
                    },
                    Message::Close(_) => break,
                    _ => debug!("Ignoring non-text frame from {}", conn),
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service
        .relay()
        .send(RelayCommand::Disconnect { conn: conn.clone() })
        .await;
    service.remove_connection(&conn);
    info!(
        "WebSocket disconnected: {} ({} open)",
        conn,
        service.connection_count()
    );
}
