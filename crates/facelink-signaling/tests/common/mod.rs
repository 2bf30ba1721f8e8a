//! Scripted signaling channel and recording peer connection for tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use facelink_common::{Error, IceCandidate, Result, SessionDescription, SignalingMessage};
use facelink_signaling::{PeerConnection, SignalingChannel};

/// What the scripted channel does once its script is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenDrained {
    /// Block forever, like a silent remote.
    Pending,
    /// Report a normally closed channel.
    Closed,
}

pub struct ScriptedChannel {
    pub incoming: VecDeque<SignalingMessage>,
    pub sent: Vec<SignalingMessage>,
    pub receives: usize,
    pub connected: bool,
    pub closed: bool,
    pub fail_receive: Option<String>,
    when_drained: WhenDrained,
}

impl ScriptedChannel {
    pub fn new(script: Vec<SignalingMessage>, when_drained: WhenDrained) -> Self {
        Self {
            incoming: script.into(),
            sent: Vec::new(),
            receives: 0,
            connected: false,
            closed: false,
            fail_receive: None,
            when_drained,
        }
    }
}

#[async_trait]
impl SignalingChannel for ScriptedChannel {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<SignalingMessage>> {
        self.receives += 1;
        if let Some(reason) = &self.fail_receive {
            return Err(Error::protocol(reason.clone()));
        }
        match self.incoming.pop_front() {
            Some(message) => Ok(Some(message)),
            None => match self.when_drained {
                WhenDrained::Closed => Ok(None),
                WhenDrained::Pending => std::future::pending().await,
            },
        }
    }

    async fn send(&mut self, message: &SignalingMessage) -> Result<()> {
        self.sent.push(message.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
    Close,
}

/// Records every call; offers and answers are derived from the remote SDP.
#[derive(Default)]
pub struct RecordingPeer {
    pub calls: Mutex<Vec<PeerCall>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    pub fail_remote: Mutex<Option<String>>,
    pub fail_close: bool,
}

impl RecordingPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&PeerCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerConnection for RecordingPeer {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(PeerCall::CreateOffer);
        Ok(SessionDescription::offer("sdp-offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(PeerCall::CreateAnswer);
        let remote = self
            .remote
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::negotiation("answer without remote offer"))?;
        Ok(SessionDescription::answer(format!("answer-to:{}", remote.sdp)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(PeerCall::SetLocal(desc.clone()));
        *self.local.lock().unwrap() = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(PeerCall::SetRemote(desc.clone()));
        if let Some(reason) = self.fail_remote.lock().unwrap().clone() {
            return Err(Error::negotiation(reason));
        }
        *self.remote.lock().unwrap() = Some(desc);
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().unwrap().clone()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(PeerCall::AddCandidate(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(PeerCall::Close);
        if self.fail_close {
            return Err(Error::internal("close failed"));
        }
        Ok(())
    }
}

pub fn offer(sdp: &str) -> SignalingMessage {
    SessionDescription::offer(sdp).into()
}

pub fn answer(sdp: &str) -> SignalingMessage {
    SessionDescription::answer(sdp).into()
}

pub fn candidate(line: &str) -> SignalingMessage {
    IceCandidate {
        candidate: line.to_string(),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
    }
    .into()
}
