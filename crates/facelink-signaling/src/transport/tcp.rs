use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use facelink_common::{Error, Result, SignalingMessage};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use super::lines::LineChannel;
use super::CONNECT_RETRY_INTERVAL;
use crate::SignalingChannel;

enum Endpoint {
    Listener(TcpListener),
    Remote { addr: String, timeout: Duration },
}

/// Newline-delimited JSON signaling over a single TCP connection.
pub struct TcpSignaling {
    endpoint: Option<Endpoint>,
    lines: Option<LineChannel<OwnedReadHalf, OwnedWriteHalf>>,
}

impl TcpSignaling {
    /// Binds `addr` now; `connect` accepts the first peer.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::transport(format!("failed to bind signaling on {addr}: {e}")))?;
        Ok(Self {
            endpoint: Some(Endpoint::Listener(listener)),
            lines: None,
        })
    }

    /// `connect` dials `addr`, retrying until `timeout` while nothing listens yet.
    pub fn connect_to(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: Some(Endpoint::Remote {
                addr: addr.into(),
                timeout,
            }),
            lines: None,
        }
    }

    /// Bound address of a listening channel that has not accepted yet.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.endpoint {
            Some(Endpoint::Listener(listener)) => listener.local_addr().ok(),
            _ => None,
        }
    }

    fn lines(&mut self) -> Result<&mut LineChannel<OwnedReadHalf, OwnedWriteHalf>> {
        self.lines
            .as_mut()
            .ok_or_else(|| Error::closed("tcp signaling is not connected"))
    }
}

async fn dial(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() < deadline => {
                debug!("signaling peer {} not reachable yet: {}", addr, e);
                time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
            Err(e) => {
                return Err(Error::transport(format!(
                    "could not reach signaling peer {addr} within {timeout:?}: {e}"
                )))
            }
        }
    }
}

#[async_trait]
impl SignalingChannel for TcpSignaling {
    async fn connect(&mut self) -> Result<()> {
        if self.lines.is_some() {
            return Ok(());
        }
        let stream = match self.endpoint.take() {
            Some(Endpoint::Listener(listener)) => {
                info!("waiting for signaling peer on {}", listener.local_addr()?);
                let (stream, peer) = listener.accept().await?;
                info!("signaling peer connected from {}", peer);
                stream
            }
            Some(Endpoint::Remote { addr, timeout }) => {
                let stream = dial(&addr, timeout).await?;
                info!("connected to signaling peer {}", addr);
                stream
            }
            None => return Err(Error::closed("tcp signaling already closed")),
        };
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        self.lines = Some(LineChannel::new(read, write));
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<SignalingMessage>> {
        self.lines()?.read_message().await
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<()> {
        self.lines()?.write_message(message).await
    }

    async fn close(&mut self) -> Result<()> {
        self.endpoint = None;
        if let Some(mut lines) = self.lines.take() {
            if let Err(e) = lines.write_message(&SignalingMessage::Bye).await {
                debug!("could not send bye on close: {}", e);
            }
            if let Err(e) = lines.shutdown().await {
                debug!("tcp signaling shutdown: {}", e);
            }
        }
        Ok(())
    }
}
