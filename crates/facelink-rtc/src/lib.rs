//! WebRTC adapter for facelink.
//!
//! [`RtcPeer`] implements [`facelink_signaling::PeerConnection`] on top of
//! webrtc-rs; [`track`] moves H.264 access units in and out of RTP.

pub mod config;
pub mod peer;
pub mod track;

pub use config::RtcConfig;
pub use peer::{IncomingTrack, MediaKind, RtcPeer};
pub use track::{TrackFeed, VideoSender};
