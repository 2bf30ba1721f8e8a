use async_trait::async_trait;
use facelink_common::{Result, SignalingMessage};

/// Transport-agnostic carrier for signaling messages.
#[async_trait]
pub trait SignalingChannel: Send {
    /// Establishes the transport. Must be called before `receive`/`send`.
    async fn connect(&mut self) -> Result<()>;

    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the remote side has closed the channel normally.
    async fn receive(&mut self) -> Result<Option<SignalingMessage>>;

    async fn send(&mut self, message: &SignalingMessage) -> Result<()>;

    /// Releases the transport, telling the remote side the session is over
    /// when the transport is still up. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: SignalingChannel + ?Sized> SignalingChannel for Box<T> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn receive(&mut self) -> Result<Option<SignalingMessage>> {
        (**self).receive().await
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<()> {
        (**self).send(message).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
