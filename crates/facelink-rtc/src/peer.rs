use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use facelink_common::{Error, IceCandidate, Result, SdpKind, SessionDescription};
use facelink_media::KeyframeRequest;
use facelink_signaling::PeerConnection;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::packet::Packet as RtcpPacket;
use webrtc::rtcp::payload_feedbacks::full_intra_request::FullIntraRequest;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::config::RtcConfig;
use crate::track::VideoSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RTPCodecType> for MediaKind {
    fn from(kind: RTPCodecType) -> Self {
        match kind {
            RTPCodecType::Audio => MediaKind::Audio,
            RTPCodecType::Video => MediaKind::Video,
            _ => MediaKind::Unknown,
        }
    }
}

/// A remote track announced by the peer.
#[derive(Clone)]
pub struct IncomingTrack {
    pub kind: MediaKind,
    pub track: Arc<TrackRemote>,
}

/// Remote candidates that arrive before the remote description.
#[derive(Debug, Default)]
struct CandidateBuffer {
    remote_applied: bool,
    pending: Vec<IceCandidate>,
}

impl CandidateBuffer {
    /// Returns the candidate if it can be applied now, buffers it otherwise.
    fn admit(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.remote_applied {
            return Some(candidate);
        }
        self.pending.push(candidate);
        None
    }

    /// Marks the remote description as applied and hands back the buffered
    /// candidates in arrival order.
    fn remote_applied(&mut self) -> Vec<IceCandidate> {
        self.remote_applied = true;
        std::mem::take(&mut self.pending)
    }
}

/// webrtc-rs peer connection.
pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    candidates: Mutex<CandidateBuffer>,
}

impl RtcPeer {
    pub async fn new(config: &RtcConfig) -> Result<Self> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| Error::resource(format!("failed to register codecs: {e}")))?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(|e| Error::resource(format!("failed to register interceptors: {e}")))?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = api
            .new_peer_connection(config.to_rtc())
            .await
            .map_err(|e| Error::resource(format!("failed to create peer connection: {e}")))?;
        let pc = Arc::new(pc);

        pc.on_peer_connection_state_change(Box::new(|state: RTCPeerConnectionState| {
            info!("peer connection state: {}", state);
            Box::pin(async {})
        }));
        pc.on_ice_connection_state_change(Box::new(|state| {
            debug!("ICE connection state: {}", state);
            Box::pin(async {})
        }));

        Ok(Self {
            pc,
            candidates: Mutex::new(CandidateBuffer::default()),
        })
    }

    pub fn state(&self) -> RTCPeerConnectionState {
        self.pc.connection_state()
    }

    /// Adds an outgoing H.264 video track. Call before creating the offer.
    pub async fn add_video_track(&self) -> Result<VideoSender> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_string(),
                ..Default::default()
            },
            "video".to_string(),
            "facelink".to_string(),
        ));
        let rtp_sender = self
            .pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::negotiation(format!("failed to add video track: {e}")))?;

        // RTCP has to be read for interceptors such as NACK to work.
        let keyframes = KeyframeRequest::new();
        let requests = keyframes.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((packets, _)) = rtp_sender.read(&mut rtcp_buf).await {
                if requests_keyframe(&packets) {
                    debug!("remote asked for a keyframe");
                    requests.raise();
                }
            }
            debug!("RTCP reader finished");
        });

        Ok(VideoSender::new(track, keyframes))
    }

    /// Registers `handler` for remote tracks. Call before negotiating.
    pub fn on_track<F>(&self, handler: F)
    where
        F: Fn(IncomingTrack) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.pc
            .on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let kind = MediaKind::from(track.kind());
                    info!("remote {} track, ssrc {}", kind, track.ssrc());
                    handler(IncomingTrack { kind, track });
                })
            }));
    }

    fn candidates(&self) -> std::sync::MutexGuard<'_, CandidateBuffer> {
        self.candidates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let line = candidate.candidate.clone();
        self.pc
            .add_ice_candidate(candidate_to_rtc(candidate))
            .await
            .map_err(|e| Error::negotiation(format!("rejected candidate {line:?}: {e}")))
    }
}

/// PLI and FIR both mean the receiver cannot decode until the next keyframe.
fn requests_keyframe(packets: &[Box<dyn RtcpPacket + Send + Sync>]) -> bool {
    packets.iter().any(|packet| {
        let packet = packet.as_any();
        packet.is::<PictureLossIndication>() || packet.is::<FullIntraRequest>()
    })
}

fn description_to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let parsed = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| Error::negotiation(format!("invalid {} sdp: {e}", desc.kind)))
}

fn description_from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(Error::negotiation(format!(
            "unsupported session description type {other}"
        ))),
    }
}

fn candidate_to_rtc(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: None,
    }
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::negotiation(format!("failed to create offer: {e}")))?;
        description_from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::negotiation(format!("failed to create answer: {e}")))?;
        description_from_rtc(answer)
    }

    /// Applies `desc` and waits until ICE gathering completes, so the local
    /// description carries every local candidate.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = description_to_rtc(desc)?;
        let mut gathering = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| Error::negotiation(format!("failed to set local description: {e}")))?;
        let _ = gathering.recv().await;
        debug!("ICE gathering complete");
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = description_to_rtc(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| Error::negotiation(format!("failed to set remote description: {e}")))?;

        let pending = self.candidates().remote_applied();
        if !pending.is_empty() {
            debug!("applying {} buffered candidates", pending.len());
        }
        for candidate in pending {
            self.apply_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.pc.local_description().await?;
        description_from_rtc(desc).ok()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let admitted = self.candidates().admit(candidate);
        match admitted {
            Some(candidate) => self.apply_candidate(candidate).await,
            None => {
                debug!("remote description not set yet, candidate buffered");
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.pc
            .close()
            .await
            .map_err(|e| Error::internal(format!("failed to close peer connection: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::rtcp::receiver_report::ReceiverReport;

    #[test]
    fn test_picture_loss_requests_keyframe() {
        let report: Box<dyn RtcpPacket + Send + Sync> = Box::new(ReceiverReport::default());
        let pli: Box<dyn RtcpPacket + Send + Sync> = Box::new(PictureLossIndication {
            sender_ssrc: 1,
            media_ssrc: 2,
        });
        assert!(!requests_keyframe(&[]));
        assert!(!requests_keyframe(std::slice::from_ref(&report)));
        assert!(requests_keyframe(&[report, pli]));
    }

    #[test]
    fn test_candidates_before_remote_are_buffered_in_order() {
        let mut buffer = CandidateBuffer::default();
        assert_eq!(buffer.admit(IceCandidate::new("candidate:a")), None);
        assert_eq!(buffer.admit(IceCandidate::new("candidate:b")), None);

        let flushed = buffer.remote_applied();
        assert_eq!(
            flushed,
            vec![IceCandidate::new("candidate:a"), IceCandidate::new("candidate:b")]
        );
        assert!(buffer.remote_applied().is_empty());
    }

    #[test]
    fn test_candidates_after_remote_pass_through() {
        let mut buffer = CandidateBuffer::default();
        buffer.remote_applied();
        assert_eq!(
            buffer.admit(IceCandidate::new("candidate:c")),
            Some(IceCandidate::new("candidate:c"))
        );
        assert!(buffer.pending.is_empty());
    }

    #[test]
    fn test_description_conversion() {
        let sdp = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";
        let rtc = description_to_rtc(SessionDescription::answer(sdp)).unwrap();
        assert_eq!(rtc.sdp_type, RTCSdpType::Answer);
        assert_eq!(
            description_from_rtc(rtc).unwrap(),
            SessionDescription::answer(sdp)
        );
    }

    #[test]
    fn test_candidate_conversion_keeps_mid_and_index() {
        let init = candidate_to_rtc(IceCandidate {
            candidate: "candidate:1 1 udp 1 10.0.0.1 5000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
        });
        assert_eq!(init.sdp_mid.as_deref(), Some("0"));
        assert_eq!(init.sdp_mline_index, Some(0));
        assert!(init.username_fragment.is_none());
    }

    #[test]
    fn test_media_kind_names() {
        assert_eq!(MediaKind::from(RTPCodecType::Video), MediaKind::Video);
        assert_eq!(MediaKind::from(RTPCodecType::Audio).to_string(), "audio");
        assert_eq!(MediaKind::from(RTPCodecType::Unspecified), MediaKind::Unknown);
    }
}
