//! facelink-server: waits for a client on the signaling channel, offers it a
//! video track and streams the camera (or a test pattern) over it.

mod capture;

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use facelink_common::init_tracing_with_default;
use facelink_media::{EncodedFrame, H264Config, Resolution};
use facelink_rtc::{RtcConfig, RtcPeer, VideoSender};
use facelink_signaling::{
    create_signaling, Session, SignalingArgs, SignalingChannel, SignalingRole,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capture::{CaptureConfig, SourceKind};

#[derive(Parser, Debug)]
#[command(name = "facelink-server", version, about = "Stream a webcam to a facelink client")]
struct Args {
    #[command(flatten)]
    signaling: SignalingArgs,

    /// Video source
    #[arg(long, env = "FACELINK_SOURCE", value_enum, default_value_t = SourceKind::default())]
    source: SourceKind,

    /// Camera index
    #[arg(long, env = "FACELINK_DEVICE", default_value_t = 0)]
    device: u32,

    #[arg(long, env = "FACELINK_WIDTH", default_value_t = 640)]
    width: u32,

    #[arg(long, env = "FACELINK_HEIGHT", default_value_t = 480)]
    height: u32,

    #[arg(long, env = "FACELINK_FPS", default_value_t = 30)]
    fps: u32,

    /// Target encoder bitrate
    #[arg(long, env = "FACELINK_BITRATE_KBPS", default_value_t = 1000)]
    bitrate_kbps: u32,

    /// Force a keyframe every N frames
    #[arg(long, env = "FACELINK_KEYFRAME_INTERVAL", default_value_t = 60)]
    keyframe_interval: u32,

    /// STUN/TURN server URLs, comma separated
    #[arg(
        long = "ice-server",
        env = "FACELINK_ICE_SERVERS",
        value_delimiter = ','
    )]
    ice_servers: Vec<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "FACELINK_LOG", default_value = "info")]
    log_level: String,
}

impl Args {
    fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            source: self.source,
            device: self.device,
            encoder: H264Config {
                resolution: Resolution::new(self.width, self.height),
                fps: self.fps,
                bitrate_kbps: self.bitrate_kbps,
                keyframe_interval: self.keyframe_interval,
            },
        }
    }
}

/// Forwards encoded units to the outgoing track until capture stops.
/// Returns the number of units written.
async fn pump(
    mut units: mpsc::Receiver<EncodedFrame>,
    sender: VideoSender,
    frame_duration: Duration,
) -> Result<u64> {
    let mut sent = 0u64;
    while let Some(unit) = units.recv().await {
        sender.send(unit, frame_duration).await?;
        sent += 1;
        if sent % 300 == 0 {
            debug!("{} frames written to the track", sent);
        }
    }
    Ok(sent)
}

type ServerSession = Session<Box<dyn SignalingChannel>, RtcPeer>;

/// Binds signaling before anything else exists, so a busy port fails with
/// nothing to release.
async fn open_session(args: &Args) -> Result<ServerSession> {
    let mut channel = create_signaling(&args.signaling, SignalingRole::Listen).await?;
    let config = RtcConfig::with_ice_servers(args.ice_servers.clone());
    match RtcPeer::new(&config).await {
        Ok(peer) => Ok(Session::new(channel, peer)),
        Err(e) => {
            if let Err(close) = channel.close().await {
                warn!("failed to close signaling channel: {}", close);
            }
            Err(e.into())
        }
    }
}

/// Attaches the video track, starts capture and runs the offer side until the
/// session ends, the media pump stops or the process is interrupted.
async fn serve(session: &mut ServerSession, capture: CaptureConfig) -> Result<()> {
    let sender = session.peer().add_video_track().await?;
    let units = capture::start(capture, sender.keyframe_request()).await?;
    let mut media = tokio::spawn(pump(units, sender, capture.frame_duration()));

    let result = tokio::select! {
        outcome = session.initiate(None) => match outcome {
            Ok(outcome) => {
                info!(?outcome, "signaling finished");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        joined = &mut media => match joined {
            Ok(Ok(sent)) => Err(anyhow!("media pump ended after {} frames", sent)),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e.into()),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };

    // Dropping the unit receiver lets the capture thread exit on its next send.
    media.abort();
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing_with_default(&args.log_level);
    info!("starting facelink-server v{}", env!("CARGO_PKG_VERSION"));

    let mut session = open_session(&args).await?;
    info!(session = %session.id(), "offering as initiator");

    let result = serve(&mut session, args.capture_config()).await;

    info!("peer connection state at shutdown: {}", session.peer().state());
    if let Err(e) = session.close().await {
        warn!("session close failed: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["facelink-server"]).unwrap();
        let capture = args.capture_config();
        assert_eq!(capture.encoder.resolution, Resolution::new(640, 480));
        assert_eq!(capture.encoder.fps, 30);
        assert_eq!(capture.source, SourceKind::default());
        assert!(args.ice_servers.is_empty());
    }

    fn local_args(port: u16, extra: &[&str]) -> Args {
        let port = port.to_string();
        let mut argv = vec![
            "facelink-server",
            "--signaling-host",
            "127.0.0.1",
            "--signaling-port",
            &port,
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    async fn free_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_busy_signaling_port_fails_before_peer_setup() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = open_session(&local_args(port, &[])).await.err().unwrap();
        let err = err.downcast::<facelink_common::Error>().unwrap();
        assert!(matches!(err, facelink_common::Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_failed_startup_releases_signaling_port() {
        let port = free_port().await;
        let mut session = open_session(&local_args(port, &[]))
            .await
            .unwrap();

        let capture = CaptureConfig {
            source: SourceKind::TestPattern,
            encoder: H264Config {
                fps: 0,
                ..H264Config::default()
            },
            device: 0,
        };
        assert!(serve(&mut session, capture).await.is_err());
        session.close().await.unwrap();

        tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("signaling port still held after close");
    }

    #[test]
    fn test_source_and_ice_servers_parse() {
        let args = Args::try_parse_from([
            "facelink-server",
            "--source",
            "test-pattern",
            "--ice-server",
            "stun:a.example:3478,stun:b.example:3478",
            "--fps",
            "15",
        ])
        .unwrap();
        assert_eq!(args.source, SourceKind::TestPattern);
        assert_eq!(args.ice_servers.len(), 2);
        assert_eq!(args.capture_config().encoder.fps, 15);
    }
}
