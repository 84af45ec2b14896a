use crate::error::{ClientError, ClientResult};
use crate::peer::SignalSink;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use walkie_core::{ClientMessage, ParticipantId, ServerMessage, Signal};

/// Canonical `http(s)://host[:port]` form of a user-entered hub address.
///
/// Bare `host[:port]` gets `http://`, websocket schemes map to their HTTP
/// counterparts, and a trailing `/ws` or `/` is dropped.
pub fn normalize_hub_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/ws").unwrap_or(trimmed);

    if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Websocket endpoint of a hub.
pub fn websocket_url(hub: &str) -> String {
    let hub = normalize_hub_url(hub);
    match hub.strip_prefix("https://") {
        Some(rest) => format!("wss://{rest}/ws"),
        None => format!("ws://{}/ws", hub.trim_start_matches("http://")),
    }
}

/// Websocket connection to a hub.
///
/// Outbound messages are queued to a writer task; inbound messages arrive
/// on the receiver returned by [`RelayClient::connect`], which closes when
/// the hub goes away.
pub struct RelayClient {
    hub_url: String,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl RelayClient {
    pub async fn connect(hub: &str) -> ClientResult<(Self, mpsc::UnboundedReceiver<ServerMessage>)> {
        let hub_url = normalize_hub_url(hub);
        let ws_url = websocket_url(&hub_url);

        let (stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| ClientError::RelayConnect(format!("{ws_url}: {e}")))?;
        info!("Connected to hub {}", ws_url);

        let (mut sender, mut receiver) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        let mut send_task = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize relay message: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = sender.close().await;
        });

        let mut recv_task = tokio::spawn(async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(message) => {
                                if inbound_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid message from hub: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Hub connection error: {}", e);
                        break;
                    }
                }
            }
        });

        let closed_url = ws_url.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = (&mut send_task) => recv_task.abort(),
                _ = (&mut recv_task) => send_task.abort(),
            };
            info!("Hub connection {} closed", closed_url);
        });

        Ok((Self { hub_url, outbound }, inbound))
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    pub fn send(&self, message: ClientMessage) -> ClientResult<()> {
        self.outbound
            .send(message)
            .map_err(|_| ClientError::RelayClosed)
    }

    pub fn join(&self, nickname: &str, room: &str) -> ClientResult<()> {
        debug!("Joining room '{}' as {}", room, nickname);
        self.send(ClientMessage::Join {
            nickname: Some(nickname.to_string()),
            room: Some(room.to_string()),
        })
    }

    pub fn request_presence(&self, room: &str) -> ClientResult<()> {
        self.send(ClientMessage::RequestPresence {
            room: Some(room.to_string()),
        })
    }

    pub fn leave(&self) -> ClientResult<()> {
        self.send(ClientMessage::Leave)
    }
}

#[async_trait]
impl SignalSink for RelayClient {
    async fn send_signal(&self, target: ParticipantId, signal: Signal) -> ClientResult<()> {
        self.send(signal.into_client_message(target))
    }
}
