use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use facelink_media::source::{FrameSource, TestPatternSource};
use facelink_media::{
    EncodedFrame, Encoder, H264Config, H264Encoder, KeyframeRequest, Resolution,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Encoded units buffered between the capture thread and the track writer.
const UNIT_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Webcam (needs the `camera` feature)
    Camera,
    /// Synthetic moving square
    TestPattern,
}

impl Default for SourceKind {
    fn default() -> Self {
        if cfg!(feature = "camera") {
            SourceKind::Camera
        } else {
            SourceKind::TestPattern
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub source: SourceKind,
    pub device: u32,
    pub encoder: H264Config,
}

impl CaptureConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.encoder.fps.max(1) as f64)
    }
}

fn open_source(config: &CaptureConfig) -> facelink_common::Result<Box<dyn FrameSource>> {
    match config.source {
        SourceKind::TestPattern => Ok(Box::new(TestPatternSource::new(
            config.encoder.resolution,
            config.encoder.fps,
        )?)),
        #[cfg(feature = "camera")]
        SourceKind::Camera => Ok(Box::new(facelink_media::source::CameraSource::open(
            config.device,
            config.encoder.resolution,
            config.encoder.fps,
        )?)),
        #[cfg(not(feature = "camera"))]
        SourceKind::Camera => Err(facelink_common::Error::config(
            "camera support not compiled in; rebuild with --features camera or use --source test-pattern",
        )),
    }
}

/// Starts the capture thread and waits until the source and encoder are up.
///
/// The thread owns the source and the encoder and pushes encoded units into
/// the returned channel. A raised `keyframes` request makes the next unit a
/// keyframe. It stops when the receiver is dropped or the source fails.
pub async fn start(
    config: CaptureConfig,
    keyframes: KeyframeRequest,
) -> Result<mpsc::Receiver<EncodedFrame>> {
    let (unit_tx, unit_rx) = mpsc::channel::<EncodedFrame>(UNIT_QUEUE_DEPTH);
    let (ready_tx, ready_rx) = oneshot::channel::<facelink_common::Result<Resolution>>();

    thread::Builder::new()
        .name("facelink-capture".into())
        .spawn(move || {
            let setup = open_source(&config).and_then(|source| {
                let encoder = H264Encoder::new(H264Config {
                    resolution: source.resolution(),
                    ..config.encoder
                })?;
                Ok((source, encoder))
            });
            let (mut source, mut encoder) = match setup {
                Ok(parts) => {
                    let _ = ready_tx.send(Ok(parts.0.resolution()));
                    parts
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            loop {
                if keyframes.take() {
                    debug!("forcing a keyframe");
                    encoder.request_keyframe();
                }
                let unit = source
                    .next_frame()
                    .and_then(|frame| encoder.encode(&frame));
                match unit {
                    Ok(unit) if unit.data.is_empty() => debug!("encoder skipped a frame"),
                    Ok(unit) => {
                        if unit_tx.blocking_send(unit).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!("capture stopped: {}", err);
                        break;
                    }
                }
            }
            debug!("capture thread exiting");
        })?;

    let resolution = ready_rx
        .await
        .map_err(|_| anyhow!("capture thread exited during startup"))??;
    info!("capturing {:?} at {}", config.source, resolution);
    Ok(unit_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelink_common::Error;

    fn config(source: SourceKind) -> CaptureConfig {
        CaptureConfig {
            source,
            device: 0,
            encoder: H264Config {
                resolution: Resolution::new(64, 48),
                fps: 60,
                ..H264Config::default()
            },
        }
    }

    #[tokio::test]
    async fn test_test_pattern_produces_units() {
        let mut units = start(config(SourceKind::TestPattern), KeyframeRequest::new())
            .await
            .unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), units.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.keyframe);
        assert!(!first.data.is_empty());
    }

    async fn recv(units: &mut mpsc::Receiver<EncodedFrame>) -> EncodedFrame {
        tokio::time::timeout(Duration::from_secs(5), units.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_keyframe_request_reaches_the_encoder() {
        let keyframes = KeyframeRequest::new();
        let mut units = start(config(SourceKind::TestPattern), keyframes.clone())
            .await
            .unwrap();

        assert!(recv(&mut units).await.keyframe);
        // Queue depth plus the unit already in flight may predate the request.
        keyframes.raise();
        let mut forced = false;
        for _ in 0..UNIT_QUEUE_DEPTH + 2 {
            if recv(&mut units).await.keyframe {
                forced = true;
                break;
            }
        }
        assert!(forced, "no keyframe after the request");
        assert!(!keyframes.take(), "request not consumed");
    }

    #[cfg(not(feature = "camera"))]
    #[tokio::test]
    async fn test_camera_without_feature_fails_at_startup() {
        let err = start(config(SourceKind::Camera), KeyframeRequest::new())
            .await
            .unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_frame_duration_follows_fps() {
        assert_eq!(
            config(SourceKind::TestPattern).frame_duration(),
            Duration::from_secs_f64(1.0 / 60.0)
        );
    }
}
