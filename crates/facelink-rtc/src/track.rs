//! H.264 access units to and from RTP tracks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use facelink_common::{Error, Result};
use facelink_media::codec::contains_idr;
use facelink_media::{EncodedFrame, KeyframeRequest, VideoFeed};
use tracing::debug;
use webrtc::media::io::sample_builder::SampleBuilder;
use webrtc::media::Sample;
use webrtc::rtp::codecs::h264::H264Packet;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// RTP clock rate for video.
const VIDEO_CLOCK_RATE: u32 = 90_000;
/// Packets the sample builder may hold back while waiting for reordering.
const MAX_LATE_PACKETS: u16 = 256;

/// Writes encoded frames to an outgoing H.264 track.
#[derive(Clone)]
pub struct VideoSender {
    track: Arc<TrackLocalStaticSample>,
    keyframes: KeyframeRequest,
}

impl VideoSender {
    pub(crate) fn new(track: Arc<TrackLocalStaticSample>, keyframes: KeyframeRequest) -> Self {
        Self { track, keyframes }
    }

    /// Raised whenever the remote side reports picture loss.
    pub fn keyframe_request(&self) -> KeyframeRequest {
        self.keyframes.clone()
    }

    /// Sends one access unit lasting `duration`. Frames written before the
    /// peer is connected are discarded by the track.
    pub async fn send(&self, frame: EncodedFrame, duration: Duration) -> Result<()> {
        if frame.data.is_empty() {
            return Ok(());
        }
        self.track
            .write_sample(&Sample {
                data: Bytes::from(frame.data),
                duration,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::media(format!("failed to write video sample: {e}")))
    }
}

/// Reassembles H.264 access units from a remote RTP track.
pub struct TrackFeed {
    track: Arc<TrackRemote>,
    builder: SampleBuilder<H264Packet>,
    first_rtp_timestamp: Option<u32>,
}

impl TrackFeed {
    pub fn new(track: Arc<TrackRemote>) -> Self {
        Self {
            track,
            builder: SampleBuilder::new(MAX_LATE_PACKETS, H264Packet::default(), VIDEO_CLOCK_RATE),
            first_rtp_timestamp: None,
        }
    }

    fn unit_from_sample(&mut self, sample: Sample) -> EncodedFrame {
        let first = *self
            .first_rtp_timestamp
            .get_or_insert(sample.packet_timestamp);
        let ticks = sample.packet_timestamp.wrapping_sub(first) as u64;
        let data = sample.data.to_vec();
        EncodedFrame {
            timestamp_us: rtp_ticks_to_us(ticks),
            keyframe: contains_idr(&data),
            data,
        }
    }
}

fn rtp_ticks_to_us(ticks: u64) -> u64 {
    ticks * 1_000_000 / VIDEO_CLOCK_RATE as u64
}

#[async_trait]
impl VideoFeed for TrackFeed {
    async fn next_unit(&mut self) -> Result<Option<EncodedFrame>> {
        loop {
            if let Some(sample) = self.builder.pop() {
                return Ok(Some(self.unit_from_sample(sample)));
            }
            match self.track.read_rtp().await {
                Ok((packet, _)) => self.builder.push(packet),
                Err(webrtc::Error::ErrClosedPipe) => {
                    debug!("remote track closed");
                    return Ok(None);
                }
                Err(e) => return Err(Error::media(format!("failed to read RTP: {e}"))),
            }
        }
    }
}
