use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use facelink_media::WorkerConfig;
use facelink_signaling::SignalingArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DetectorKind {
    /// Reports no detection for every frame
    Placeholder,
    /// Centroid of the brightest pixels
    Brightness,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "facelink-client", version, about = "Receive video and run detection on it")]
pub struct ClientArgs {
    #[command(flatten)]
    pub signaling: SignalingArgs,

    /// Detector run on every received frame
    #[arg(long, env = "FACELINK_DETECTOR", value_enum, default_value_t = DetectorKind::Placeholder)]
    pub detector: DetectorKind,

    /// Luma threshold for the brightness detector
    #[arg(long, env = "FACELINK_BRIGHTNESS_THRESHOLD", default_value_t = 200)]
    pub brightness_threshold: u8,

    /// Draw the detection onto a copy of each frame
    #[arg(long, env = "FACELINK_ANNOTATE", default_value = "false")]
    pub annotate: bool,

    /// Write annotated frames as PNG into this directory
    #[arg(long, env = "FACELINK_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Write every Nth processed frame
    #[arg(long, env = "FACELINK_SNAPSHOT_EVERY", default_value_t = 30)]
    pub snapshot_every: u64,

    /// Frames waiting for the detector before new ones are dropped
    #[arg(long, env = "FACELINK_QUEUE_DEPTH", default_value_t = 2)]
    pub queue_depth: usize,

    /// STUN/TURN server URL (repeatable)
    #[arg(long = "ice-server", env = "FACELINK_ICE_SERVERS", value_delimiter = ',')]
    pub ice_servers: Vec<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "FACELINK_LOG", default_value = "info")]
    pub log_level: String,
}

impl ClientArgs {
    /// Snapshots need annotated frames, so they imply annotation.
    pub fn wants_annotation(&self) -> bool {
        self.annotate || self.snapshot_dir.is_some()
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            queue_depth: self.queue_depth,
            ..WorkerConfig::default()
        }
    }
}
