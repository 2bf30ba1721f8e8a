//! Signaling for facelink peer connections.
//!
//! This crate provides:
//! - the [`SignalingChannel`] and [`PeerConnection`] seams
//! - the dispatcher that turns inbound signaling into peer connection calls
//! - [`Session`], which owns one channel and one peer connection and releases both
//! - concrete transports (TCP, Unix socket, copy-and-paste, WebSocket, in-memory)

#![forbid(unsafe_code)]

pub mod args;
pub mod channel;
pub mod dispatcher;
pub mod peer;
pub mod session;
pub mod transport;

pub use args::{SignalingArgs, SignalingKind};
pub use channel::SignalingChannel;
pub use dispatcher::{dispatch_one, run, Dispatch, EndReason, SessionOutcome};
pub use peer::PeerConnection;
pub use session::Session;
pub use transport::{create_signaling, SignalingRole};
