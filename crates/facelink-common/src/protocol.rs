use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Role of a session description in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpKind::Offer => "offer",
            SdpKind::Answer => "answer",
        }
    }
}

impl std::fmt::Display for SdpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer or answer with its opaque SDP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A remote transport address advertised by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    /// Candidate line, `candidate:` prefix included.
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

/// Every message that can travel over a signaling channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingMessage {
    Description(SessionDescription),
    Candidate(IceCandidate),
    /// End of session.
    Bye,
}

impl SignalingMessage {
    /// Short name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            SignalingMessage::Description(desc) => desc.kind.as_str(),
            SignalingMessage::Candidate(_) => "candidate",
            SignalingMessage::Bye => "bye",
        }
    }

    /// Encodes the message as one line of JSON (no trailing newline).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&WireMessage::from(self))?)
    }

    /// Decodes one JSON message.
    ///
    /// Unknown `type` tags, missing fields and invalid JSON are protocol
    /// errors: a peer speaking something else must not be ignored silently.
    pub fn from_json(text: &str) -> Result<Self> {
        let wire: WireMessage = serde_json::from_str(text.trim())
            .map_err(|e| Error::protocol(format!("unrecognized signaling message: {e}")))?;
        Ok(wire.into())
    }
}

impl From<SessionDescription> for SignalingMessage {
    fn from(desc: SessionDescription) -> Self {
        SignalingMessage::Description(desc)
    }
}

impl From<IceCandidate> for SignalingMessage {
    fn from(candidate: IceCandidate) -> Self {
        SignalingMessage::Candidate(candidate)
    }
}

/// JSON shape on the wire, one object per message.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Candidate {
        candidate: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<u16>,
    },
    Bye,
}

impl From<&SignalingMessage> for WireMessage {
    fn from(msg: &SignalingMessage) -> Self {
        match msg {
            SignalingMessage::Description(desc) => match desc.kind {
                SdpKind::Offer => WireMessage::Offer {
                    sdp: desc.sdp.clone(),
                },
                SdpKind::Answer => WireMessage::Answer {
                    sdp: desc.sdp.clone(),
                },
            },
            SignalingMessage::Candidate(c) => WireMessage::Candidate {
                candidate: c.candidate.clone(),
                id: c.sdp_mid.clone(),
                label: c.sdp_mline_index,
            },
            SignalingMessage::Bye => WireMessage::Bye,
        }
    }
}

impl From<WireMessage> for SignalingMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::Offer { sdp } => SessionDescription::offer(sdp).into(),
            WireMessage::Answer { sdp } => SessionDescription::answer(sdp).into(),
            WireMessage::Candidate {
                candidate,
                id,
                label,
            } => IceCandidate {
                candidate,
                sdp_mid: id,
                sdp_mline_index: label,
            }
            .into(),
            WireMessage::Bye => SignalingMessage::Bye,
        }
    }
}
