use std::time::Duration;

use async_trait::async_trait;
use facelink_common::{Error, Result, SignalingMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{CONNECT_RETRY_INTERVAL, MAX_MESSAGE_BYTES};
use crate::SignalingChannel;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Signaling through a WebSocket relay that forwards text frames between
/// the two peers of a room.
pub struct WebSocketSignaling {
    url: String,
    timeout: Duration,
    ws: Option<WsStream>,
}

impl WebSocketSignaling {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        validate_signaling_url(&url)?;
        Ok(Self {
            url,
            timeout,
            ws: None,
        })
    }

    fn ws(&mut self) -> Result<&mut WsStream> {
        self.ws
            .as_mut()
            .ok_or_else(|| Error::closed("websocket signaling is not connected"))
    }
}

fn validate_signaling_url(url: &str) -> Result<()> {
    let lower = url.trim().to_ascii_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        return Ok(());
    }
    Err(Error::config(format!(
        "signaling URL must start with ws:// or wss://, got {url}"
    )))
}

fn decode_text(text: &str) -> Result<SignalingMessage> {
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(Error::protocol(format!(
            "signaling message exceeds {MAX_MESSAGE_BYTES} bytes"
        )));
    }
    SignalingMessage::from_json(text)
}

#[async_trait]
impl SignalingChannel for WebSocketSignaling {
    async fn connect(&mut self) -> Result<()> {
        if self.ws.is_some() {
            return Ok(());
        }
        let deadline = Instant::now() + self.timeout;
        let ws = loop {
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => break ws,
                Err(e) if Instant::now() < deadline => {
                    debug!("signaling relay {} not reachable yet: {}", self.url, e);
                    time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
                Err(e) => {
                    return Err(Error::transport(format!(
                        "could not reach signaling relay {}: {e}",
                        self.url
                    )))
                }
            }
        };
        info!("connected to signaling relay: {}", self.url);
        self.ws = Some(ws);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<SignalingMessage>> {
        let ws = self.ws()?;
        while let Some(frame) = ws.next().await {
            match frame.map_err(|e| Error::transport(format!("signaling websocket error: {e}")))? {
                WsMessage::Text(text) => return decode_text(&text).map(Some),
                WsMessage::Binary(bytes) => {
                    let text = String::from_utf8(bytes)
                        .map_err(|_| Error::protocol("binary signaling frame is not UTF-8"))?;
                    return decode_text(&text).map(Some);
                }
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<()> {
        let text = message.to_json()?;
        self.ws()?
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| Error::transport(format!("failed to send signaling message: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut ws) = self.ws.take() {
            if let Ok(text) = SignalingMessage::Bye.to_json() {
                if let Err(e) = ws.send(WsMessage::Text(text)).await {
                    debug!("could not send bye on close: {}", e);
                }
            }
            if let Err(e) = ws.close(None).await {
                warn!("websocket close failed: {}", e);
            }
        }
        Ok(())
    }
}
