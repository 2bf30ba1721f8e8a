use std::sync::Arc;

use async_trait::async_trait;
use facelink_common::{IceCandidate, Result, SessionDescription};

/// The negotiation surface of a WebRTC peer connection.
///
/// Implementations own the connection state machine; callers only trigger
/// transitions. Track attachment and track events are engine specific and
/// live on the implementation.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Current local description, including any candidates gathered so far.
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: PeerConnection + ?Sized> PeerConnection for Arc<T> {
    async fn create_offer(&self) -> Result<SessionDescription> {
        (**self).create_offer().await
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        (**self).create_answer().await
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        (**self).set_local_description(desc).await
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        (**self).set_remote_description(desc).await
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        (**self).local_description().await
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        (**self).add_ice_candidate(candidate).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
