//! Receive stage: incoming access units to decoded frames for the worker.

use facelink_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::worker::FrameSubmitter;
use crate::{Decoder, VideoFeed};

/// Consecutive feed or decode failures tolerated before giving up.
pub const MAX_CONSECUTIVE_STREAM_ERRORS: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub units: u64,
    pub frames: u64,
    pub submitted: u64,
    /// Frames the worker queue had no room for.
    pub dropped: u64,
    pub errors: u64,
}

/// Pulls units from `feed`, decodes them and submits the frames.
///
/// Feed and decode errors are treated as transient and logged; the stage
/// fails with [`Error::Media`] only after
/// [`MAX_CONSECUTIVE_STREAM_ERRORS`] of them in a row. Ends cleanly when the
/// feed ends.
pub async fn run_receive_stage<F, D>(
    feed: &mut F,
    decoder: &mut D,
    submitter: &FrameSubmitter,
) -> Result<ReceiveStats>
where
    F: VideoFeed + ?Sized,
    D: Decoder + ?Sized,
{
    let mut stats = ReceiveStats::default();
    let mut consecutive = 0u32;

    loop {
        let step = match feed.next_unit().await {
            Ok(Some(unit)) => {
                stats.units += 1;
                decoder.decode(&unit)
            }
            Ok(None) => {
                info!(?stats, "video feed ended");
                return Ok(stats);
            }
            Err(e) => Err(e),
        };

        match step {
            Ok(Some(frame)) => {
                consecutive = 0;
                stats.frames += 1;
                if submitter.submit(frame)? {
                    stats.submitted += 1;
                } else {
                    stats.dropped += 1;
                }
            }
            Ok(None) => {
                consecutive = 0;
                debug!("decoder needs more data");
            }
            Err(e) => {
                consecutive += 1;
                stats.errors += 1;
                if consecutive >= MAX_CONSECUTIVE_STREAM_ERRORS {
                    return Err(Error::media(format!(
                        "giving up after {consecutive} consecutive stream errors, last: {e}"
                    )));
                }
                warn!(
                    "video stream interrupted ({}/{}): {}",
                    consecutive, MAX_CONSECUTIVE_STREAM_ERRORS, e
                );
            }
        }
    }
}
