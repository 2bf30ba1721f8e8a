use facelink_common::{Error, Result, SignalingMessage};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::dispatcher::{self, SessionOutcome};
use crate::{PeerConnection, SignalingChannel};

/// One signaling session: a channel and the peer connection it negotiates.
///
/// The session owns both for its whole lifetime. Callers must finish with
/// [`Session::close`], which releases both resources whatever happened
/// before, including an interrupted `initiate`/`respond` future.
pub struct Session<C, P> {
    id: Uuid,
    channel: C,
    peer: P,
}

impl<C, P> Session<C, P>
where
    C: SignalingChannel,
    P: PeerConnection,
{
    pub fn new(channel: C, peer: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            peer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    /// Offering side: connect, send a local offer, then dispatch until the end.
    pub async fn initiate(&mut self, limit: Option<usize>) -> Result<SessionOutcome> {
        let span = info_span!("session", id = %self.id, role = "initiator");
        async move {
            self.channel.connect().await?;

            let offer = self.peer.create_offer().await?;
            self.peer.set_local_description(offer).await?;
            let local = self
                .peer
                .local_description()
                .await
                .ok_or_else(|| Error::negotiation("no local description after creating offer"))?;
            self.channel.send(&SignalingMessage::from(local)).await?;
            info!("offer sent");

            let outcome = dispatcher::run(&mut self.channel, &self.peer, limit).await?;
            info!(?outcome, "session finished");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Answering side: connect, then dispatch until the end.
    pub async fn respond(&mut self, limit: Option<usize>) -> Result<SessionOutcome> {
        let span = info_span!("session", id = %self.id, role = "responder");
        async move {
            self.channel.connect().await?;
            info!("waiting for an offer");

            let outcome = dispatcher::run(&mut self.channel, &self.peer, limit).await?;
            info!(?outcome, "session finished");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Closes the peer connection and the channel.
    ///
    /// Both closes always run; the first failure is returned.
    pub async fn close(mut self) -> Result<()> {
        let peer = self.peer.close().await;
        if let Err(e) = &peer {
            warn!(session = %self.id, "failed to close peer connection: {}", e);
        }
        let channel = self.channel.close().await;
        if let Err(e) = &channel {
            warn!(session = %self.id, "failed to close signaling channel: {}", e);
        }
        info!(session = %self.id, "session resources released");
        peer.and(channel)
    }
}
