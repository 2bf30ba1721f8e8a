use async_trait::async_trait;
use facelink_common::{Error, Result, SignalingMessage};
use tokio::io::{Stdin, Stdout};

use super::lines::LineChannel;
use crate::SignalingChannel;

/// Manual signaling: messages are printed on stdout and the remote party's
/// messages are pasted on stdin, one JSON object per line.
pub struct StdioSignaling {
    lines: Option<LineChannel<Stdin, Stdout>>,
}

impl StdioSignaling {
    pub fn new() -> Self {
        Self { lines: None }
    }

    fn lines(&mut self) -> Result<&mut LineChannel<Stdin, Stdout>> {
        self.lines
            .as_mut()
            .ok_or_else(|| Error::closed("copy-and-paste signaling is not connected"))
    }
}

impl Default for StdioSignaling {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingChannel for StdioSignaling {
    async fn connect(&mut self) -> Result<()> {
        if self.lines.is_none() {
            self.lines = Some(LineChannel::new(tokio::io::stdin(), tokio::io::stdout()));
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<SignalingMessage>> {
        let lines = self.lines()?;
        eprintln!("-- Please enter a message from remote party --");
        lines.read_message().await
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<()> {
        let lines = self.lines()?;
        eprintln!("-- Please send this message to the remote party --");
        lines.write_message(message).await
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut lines) = self.lines.take() {
            eprintln!("-- Please send this message to the remote party --");
            lines.write_message(&SignalingMessage::Bye).await?;
        }
        Ok(())
    }
}
