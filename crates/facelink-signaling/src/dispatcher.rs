//! Translation of inbound signaling into peer connection calls.
//!
//! The dispatcher holds no state of its own. Every inbound message is applied
//! to the peer connection in arrival order; an offer is answered on the same
//! channel. Errors from the channel or the peer connection propagate to the
//! caller unchanged.

use facelink_common::{Error, Result, SdpKind, SignalingMessage};
use tracing::{debug, info};

use crate::{PeerConnection, SignalingChannel};

/// Why a session stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The remote side sent the end-of-session message.
    Bye,
    /// The signaling transport was closed normally.
    ChannelClosed,
}

/// Result of handling a single signaling message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Terminate(EndReason),
}

/// How [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The session ended; `messages` counts dispatch invocations, the final one included.
    Ended { reason: EndReason, messages: usize },
    /// The invocation limit was reached before the session ended.
    LimitReached { messages: usize },
}

impl SessionOutcome {
    pub fn messages(&self) -> usize {
        match self {
            SessionOutcome::Ended { messages, .. } | SessionOutcome::LimitReached { messages } => {
                *messages
            }
        }
    }
}

/// Receives one message from `channel` and applies it to `peer`.
pub async fn dispatch_one<C, P>(channel: &mut C, peer: &P) -> Result<Dispatch>
where
    C: SignalingChannel + ?Sized,
    P: PeerConnection + ?Sized,
{
    let Some(message) = channel.receive().await? else {
        info!("signaling channel closed by remote");
        return Ok(Dispatch::Terminate(EndReason::ChannelClosed));
    };
    debug!(kind = message.label(), "signaling message received");

    match message {
        SignalingMessage::Description(desc) => {
            let kind = desc.kind;
            peer.set_remote_description(desc).await?;
            info!("remote {} applied", kind);

            if kind == SdpKind::Offer {
                let answer = peer.create_answer().await?;
                peer.set_local_description(answer).await?;
                let local = peer
                    .local_description()
                    .await
                    .ok_or_else(|| Error::negotiation("no local description after answering"))?;
                channel.send(&SignalingMessage::from(local)).await?;
                info!("answer sent");
            }
        }
        SignalingMessage::Candidate(candidate) => {
            debug!(candidate = %candidate.candidate, "applying remote candidate");
            peer.add_ice_candidate(candidate).await?;
        }
        SignalingMessage::Bye => {
            info!("remote ended the session");
            return Ok(Dispatch::Terminate(EndReason::Bye));
        }
    }

    Ok(Dispatch::Continue)
}

/// Dispatches messages until the session ends or `limit` invocations happened.
///
/// `limit = None` runs until the session ends.
pub async fn run<C, P>(channel: &mut C, peer: &P, limit: Option<usize>) -> Result<SessionOutcome>
where
    C: SignalingChannel + ?Sized,
    P: PeerConnection + ?Sized,
{
    let mut messages = 0usize;
    loop {
        if limit.is_some_and(|max| messages >= max) {
            debug!(messages, "dispatch limit reached");
            return Ok(SessionOutcome::LimitReached { messages });
        }

        let step = dispatch_one(channel, peer).await?;
        messages += 1;

        if let Dispatch::Terminate(reason) = step {
            return Ok(SessionOutcome::Ended { reason, messages });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_message_count() {
        let ended = SessionOutcome::Ended {
            reason: EndReason::Bye,
            messages: 3,
        };
        assert_eq!(ended.messages(), 3);
        assert_eq!(SessionOutcome::LimitReached { messages: 1 }.messages(), 1);
    }
}
