use anyhow::{Context, Result, anyhow, bail};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use walkie_core::{ClientMessage, ParticipantId, ServerMessage};
use walkie_server::{HubConfig, SignalingService, router};

use super::SIGNAL_TIMEOUT_MS;

/// Starts a hub on an ephemeral loopback port.
pub async fn spawn_hub() -> Result<SocketAddr> {
    spawn_hub_with(HubConfig::default()).await
}

pub async fn spawn_hub_with(config: HubConfig) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(walkie_server::serve_listener(listener, config));
    Ok(addr)
}

pub fn fixture(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Starts a hub and keeps a handle on its signaling service.
pub async fn spawn_hub_with_service() -> Result<(SocketAddr, SignalingService)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let service = SignalingService::start();
    let app = router(service.clone(), &HubConfig::default());
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok((addr, service))
}

/// Minimal websocket peer speaking the hub's JSON protocol.
pub struct WsClient {
    pub id: ParticipantId,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Connects and consumes the `welcome` frame.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (stream, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .context("websocket connect failed")?;
        let mut client = Self {
            id: ParticipantId::from(""),
            stream,
        };

        match client.recv().await? {
            ServerMessage::Welcome { id } => client.id = id,
            other => bail!("expected welcome, got {:?}", other),
        }
        Ok(client)
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.send_raw(&json).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ServerMessage> {
        let wait = async {
            while let Some(frame) = self.stream.next().await {
                if let Message::Text(text) = frame? {
                    return Ok(serde_json::from_str(text.as_str())?);
                }
            }
            Err(anyhow!("socket closed"))
        };
        timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), wait)
            .await
            .map_err(|_| anyhow!("timed out waiting for a frame"))?
    }

    /// Skips frames until `pick` accepts one.
    pub async fn recv_until<T>(
        &mut self,
        mut pick: impl FnMut(ServerMessage) -> Option<T>,
    ) -> Result<T> {
        loop {
            if let Some(found) = pick(self.recv().await?) {
                return Ok(found);
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
