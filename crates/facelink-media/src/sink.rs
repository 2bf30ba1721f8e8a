//! Consumers of detection results.

use std::path::{Path, PathBuf};

use facelink_common::{Error, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{Coordinates, DetectionResult};

pub trait DisplaySink: Send {
    fn show(&mut self, result: &DetectionResult) -> Result<()>;
}

impl DisplaySink for Vec<Box<dyn DisplaySink>> {
    fn show(&mut self, result: &DetectionResult) -> Result<()> {
        for sink in self.iter_mut() {
            sink.show(result)?;
        }
        Ok(())
    }
}

/// Logs coordinates; changes at info level, repeats at debug.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<Coordinates>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for LogSink {
    fn show(&mut self, result: &DetectionResult) -> Result<()> {
        let c = result.detection.coordinates();
        if self.last != Some(c) {
            info!(seq = result.sequence, "x: {}, y: {}", c.x, c.y);
            self.last = Some(c);
        } else {
            debug!(seq = result.sequence, "x: {}, y: {}", c.x, c.y);
        }
        Ok(())
    }
}

/// Writes every Nth annotated frame to a directory as PNG.
#[derive(Debug)]
pub struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    written: u64,
}

impl SnapshotSink {
    /// Creates `dir` if needed. `every` must be at least 1.
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Result<Self> {
        if every == 0 {
            return Err(Error::config("snapshot interval must be at least 1"));
        }
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            every,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DisplaySink for SnapshotSink {
    fn show(&mut self, result: &DetectionResult) -> Result<()> {
        if result.sequence % self.every != 0 {
            return Ok(());
        }
        let Some(frame) = result.detection.frame() else {
            return Ok(());
        };
        let path = self.dir.join(format!("frame-{:06}.png", result.sequence));
        frame
            .to_image()?
            .save(&path)
            .map_err(|e| Error::media(format!("failed to write {}: {e}", path.display())))?;
        self.written += 1;
        debug!("snapshot written to {}", path.display());
        Ok(())
    }
}

/// Feeds every result to `sink` until the worker's result queue closes.
///
/// Sink failures are logged and do not stop the loop. Returns the number of
/// results seen.
pub async fn run_display<S>(results: &mut mpsc::Receiver<DetectionResult>, sink: &mut S) -> u64
where
    S: DisplaySink + ?Sized,
{
    let mut seen = 0;
    while let Some(result) = results.recv().await {
        seen += 1;
        if let Err(e) = sink.show(&result) {
            warn!("display sink failed: {}", e);
        }
    }
    seen
}
