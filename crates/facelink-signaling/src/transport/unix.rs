use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use facelink_common::{Error, Result, SignalingMessage};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use super::lines::LineChannel;
use super::CONNECT_RETRY_INTERVAL;
use crate::SignalingChannel;

enum Endpoint {
    Listener(UnixListener),
    Remote(Duration),
}

/// Newline-delimited JSON signaling over a Unix domain socket.
pub struct UnixSignaling {
    path: PathBuf,
    listening: bool,
    endpoint: Option<Endpoint>,
    lines: Option<LineChannel<OwnedReadHalf, OwnedWriteHalf>>,
}

impl UnixSignaling {
    /// Binds the socket at `path`, replacing a stale socket file.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path).map_err(|e| {
            Error::transport(format!("failed to bind signaling socket {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            listening: true,
            endpoint: Some(Endpoint::Listener(listener)),
            lines: None,
        })
    }

    pub fn connect_to(path: &Path, timeout: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            listening: false,
            endpoint: Some(Endpoint::Remote(timeout)),
            lines: None,
        }
    }

    fn lines(&mut self) -> Result<&mut LineChannel<OwnedReadHalf, OwnedWriteHalf>> {
        self.lines
            .as_mut()
            .ok_or_else(|| Error::closed("unix signaling is not connected"))
    }
}

#[async_trait]
impl SignalingChannel for UnixSignaling {
    async fn connect(&mut self) -> Result<()> {
        if self.lines.is_some() {
            return Ok(());
        }
        let stream = match self.endpoint.take() {
            Some(Endpoint::Listener(listener)) => {
                info!("waiting for signaling peer on {}", self.path.display());
                let (stream, _) = listener.accept().await?;
                info!("signaling peer connected");
                stream
            }
            Some(Endpoint::Remote(timeout)) => {
                let deadline = Instant::now() + timeout;
                loop {
                    match UnixStream::connect(&self.path).await {
                        Ok(stream) => break stream,
                        Err(e) if Instant::now() < deadline => {
                            debug!("signaling socket {} not ready: {}", self.path.display(), e);
                            time::sleep(CONNECT_RETRY_INTERVAL).await;
                        }
                        Err(e) => {
                            return Err(Error::transport(format!(
                                "could not reach signaling socket {} within {timeout:?}: {e}",
                                self.path.display()
                            )))
                        }
                    }
                }
            }
            None => return Err(Error::closed("unix signaling already closed")),
        };
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
                debug!("unix signaling shutdown: {}", e);
            }
        }
        if self.listening {
            self.listening = false;
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!("could not remove {}: {}", self.path.display(), e);
            }
        }
        Ok(())
    }
}
