use async_trait::async_trait;
use facelink_common::{Error, Result, SignalingMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// In-process signaling endpoint. Create connected endpoints with [`pair`].
pub struct MemorySignaling {
    tx: Option<mpsc::UnboundedSender<SignalingMessage>>,
    rx: mpsc::UnboundedReceiver<SignalingMessage>,
}

/// Two endpoints wired to each other.
pub fn pair() -> (MemorySignaling, MemorySignaling) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MemorySignaling {
            tx: Some(a_tx),
            rx: b_rx,
        },
        MemorySignaling {
            tx: Some(b_tx),
            rx: a_rx,
        },
    )
}

#[async_trait]
impl crate::SignalingChannel for MemorySignaling {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<SignalingMessage>> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or_else(|| Error::closed("memory signaling closed"))?
            .send(message.clone())
            .map_err(|_| Error::closed("remote memory endpoint dropped"))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            if tx.send(SignalingMessage::Bye).is_err() {
                debug!("remote memory endpoint already gone");
            }
        }
        self.rx.close();
        Ok(())
    }
}
