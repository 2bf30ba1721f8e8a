//! Wiring between the peer connection, the detection worker and the sinks.

use std::future::Future;

use facelink_common::{Error, Result};
use facelink_media::detect::{Annotate, BrightnessDetector, Detector, PlaceholderDetector};
use facelink_media::relay::{run_receive_stage, ReceiveStats};
use facelink_media::sink::{DisplaySink, LogSink, SnapshotSink};
use facelink_media::{FrameSubmitter, H264Decoder};
use facelink_rtc::{MediaKind, RtcConfig, RtcPeer, TrackFeed};
use facelink_signaling::{create_signaling, Session, SignalingChannel, SignalingRole};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::args::{ClientArgs, DetectorKind};

pub fn build_detector(args: &ClientArgs) -> Box<dyn Detector> {
    let base: Box<dyn Detector> = match args.detector {
        DetectorKind::Placeholder => Box::new(PlaceholderDetector),
        DetectorKind::Brightness => Box::new(BrightnessDetector::new(args.brightness_threshold)),
    };
    if args.wants_annotation() {
        Box::new(Annotate::new(base))
    } else {
        base
    }
}

pub fn build_sink(args: &ClientArgs) -> Result<Vec<Box<dyn DisplaySink>>> {
    let mut sinks: Vec<Box<dyn DisplaySink>> = vec![Box::new(LogSink::new())];
    if let Some(dir) = &args.snapshot_dir {
        let snapshots = SnapshotSink::new(dir, args.snapshot_every)?;
        info!("writing snapshots to {}", snapshots.dir().display());
        sinks.push(Box::new(snapshots));
    }
    Ok(sinks)
}

/// Accepts video tracks; anything else fails the session.
pub fn route_track<T>(kind: MediaKind, track: T) -> Result<T> {
    if kind == MediaKind::Video {
        return Ok(track);
    }
    error!("rejecting unexpected {} track", kind);
    Err(Error::protocol(format!("unexpected {kind} track")))
}

/// Starts a receive stage for every routed track.
///
/// Returns the first error: a rejected track or a failed stage. Returns
/// `Ok` once the track channel closes and every stage has finished.
pub async fn supervise_tracks<T, F, Fut>(
    mut tracks: mpsc::UnboundedReceiver<Result<T>>,
    mut start: F,
) -> Result<()>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<ReceiveStats>> + Send + 'static,
{
    let mut stages = JoinSet::new();
    let mut open = true;
    while open || !stages.is_empty() {
        tokio::select! {
            routed = tracks.recv(), if open => match routed {
                Some(track) => {
                    stages.spawn(start(track?));
                }
                None => open = false,
            },
            Some(done) = stages.join_next() => {
                let stats = done
                    .map_err(|e| Error::internal(format!("receive stage aborted: {e}")))??;
                info!(?stats, "receive stage finished");
            }
        }
    }
    Ok(())
}

/// Answers the remote offer and feeds received video to `submitter` until
/// the session ends, a receive stage fails or the process is interrupted.
///
/// Once created, the peer connection and the signaling channel are closed on
/// every return path.
pub async fn answer(args: &ClientArgs, submitter: FrameSubmitter) -> Result<()> {
    let mut channel = create_signaling(&args.signaling, SignalingRole::Connect).await?;
    let config = RtcConfig::with_ice_servers(args.ice_servers.clone());
    let peer = match RtcPeer::new(&config).await {
        Ok(peer) => peer,
        Err(e) => {
            if let Err(close) = channel.close().await {
                warn!("failed to close signaling channel: {}", close);
            }
            return Err(e);
        }
    };

    let (track_tx, track_rx) = mpsc::unbounded_channel();
    peer.on_track(move |incoming| {
        let _ = track_tx.send(route_track(incoming.kind, incoming.track));
    });
    let mut media = tokio::spawn(supervise_tracks(track_rx, move |track| {
        let submitter = submitter.clone();
        async move {
            let mut feed = TrackFeed::new(track);
            let mut decoder = H264Decoder::new()?;
            run_receive_stage(&mut feed, &mut decoder, &submitter).await
        }
    }));

    let mut session = Session::new(channel, peer);
    info!(session = %session.id(), "answering as responder");

    let result = tokio::select! {
        outcome = session.respond(None) => outcome.map(|outcome| {
            info!(?outcome, "signaling finished");
        }),
        joined = &mut media => joined
            .map_err(|e| Error::internal(format!("media task failed: {e}")))
            .and_then(|stages| stages),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };

    media.abort();
    info!("peer connection state at shutdown: {}", session.peer().state());
    if let Err(e) = session.close().await {
        warn!("session close failed: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use facelink_media::{Coordinates, Resolution, VideoFrame};

    fn args(extra: &[&str]) -> ClientArgs {
        let mut argv = vec!["facelink-client"];
        argv.extend_from_slice(extra);
        ClientArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_only_video_tracks_are_accepted() {
        assert_eq!(route_track(MediaKind::Video, 7).unwrap(), 7);
        let err = route_track(MediaKind::Audio, 7).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("unexpected audio track"));
    }

    #[test]
    fn test_detector_selection() {
        let mut frame = VideoFrame::filled(Resolution::new(4, 4), [0, 0, 0]);
        frame.data[0..3].copy_from_slice(&[255, 255, 255]);

        let mut placeholder = build_detector(&args(&[]));
        assert_eq!(placeholder.detect(&frame).unwrap().coordinates(), Coordinates::NONE);

        let mut bright = build_detector(&args(&["--detector", "brightness"]));
        let detection = bright.detect(&frame).unwrap();
        assert_eq!(detection.coordinates(), Coordinates::new(0.0, 0.0));
        assert!(detection.frame().is_none());

        let mut annotated = build_detector(&args(&["--detector", "brightness", "--annotate"]));
        assert!(annotated.detect(&frame).unwrap().frame().is_some());
    }

    #[test]
    fn test_sinks_include_snapshots_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let path_arg = path.to_str().unwrap();
        assert_eq!(build_sink(&args(&[])).unwrap().len(), 1);
        assert_eq!(build_sink(&args(&["--snapshot-dir", path_arg])).unwrap().len(), 2);
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_rejected_track_stops_supervision() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(1u32)).unwrap();
        tx.send(route_track(MediaKind::Audio, 2u32)).unwrap();

        let err = supervise_tracks(rx, |_| async {
            std::future::pending::<()>().await;
            Ok(ReceiveStats::default())
        })
        .await
        .unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_stage_failure_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(1u32)).unwrap();

        let err = supervise_tracks(rx, |_| async { Err(Error::media("stream lost")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Media(_)));
        drop(tx);
    }

    #[tokio::test]
    async fn test_finishes_when_tracks_close_and_stages_end() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(1u32)).unwrap();
        tx.send(Ok(2u32)).unwrap();
        drop(tx);

        supervise_tracks(rx, |_| async { Ok(ReceiveStats::default()) })
            .await
            .unwrap();
    }
}
