//! Detection on a dedicated OS thread.
//!
//! Frames reach the thread through a bounded queue that never blocks the
//! caller: a full queue drops the frame. The thread polls the queue, runs
//! the detector, publishes the latest coordinates in [`SharedCoordinates`]
//! and forwards each [`DetectionResult`] on a second bounded queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use facelink_common::{Error, Result};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, info, warn};

use crate::detect::Detector;
use crate::{Coordinates, DetectionResult, VideoFrame};

/// Latest detection point, shared between the worker and its readers.
#[derive(Debug, Clone, Default)]
pub struct SharedCoordinates(Arc<Mutex<Coordinates>>);

impl SharedCoordinates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Coordinates {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, coordinates: Coordinates) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = coordinates;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Frames waiting for the detector; further frames are dropped.
    pub queue_depth: usize,
    /// Results waiting for the display loop; further results are dropped.
    pub result_depth: usize,
    /// Sleep between polls of an empty frame queue.
    pub idle_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_depth: 2,
            result_depth: 8,
            idle_backoff: Duration::from_millis(5),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub submitted: u64,
    /// Frames dropped because the queue was full.
    pub dropped: u64,
    pub processed: u64,
    /// Frames the detector failed on.
    pub failed: u64,
    /// Results dropped because the display loop fell behind or went away.
    pub results_dropped: u64,
}

#[derive(Debug, Default)]
struct SubmitCounters {
    submitted: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
struct ThreadCounters {
    processed: u64,
    failed: u64,
    results_dropped: u64,
}

/// Cloneable handle that feeds frames to the worker.
#[derive(Debug, Clone)]
pub struct FrameSubmitter {
    tx: mpsc::Sender<VideoFrame>,
    counters: Arc<SubmitCounters>,
}

impl FrameSubmitter {
    /// Queues `frame` without waiting. Returns `false` if the queue was
    /// full and the frame was dropped.
    pub fn submit(&self, frame: VideoFrame) -> Result<bool> {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(dropped, "detection queue full, frame dropped");
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(Error::closed("detection worker has stopped")),
        }
    }
}

pub struct DetectionWorker {
    submitter: FrameSubmitter,
    coordinates: SharedCoordinates,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<ThreadCounters>>,
}

impl DetectionWorker {
    /// Starts the worker thread with `detector`. Returns the worker and the
    /// receiving end of the result queue.
    pub fn spawn<D>(
        detector: D,
        config: WorkerConfig,
    ) -> Result<(Self, mpsc::Receiver<DetectionResult>)>
    where
        D: Detector + 'static,
    {
        if config.queue_depth == 0 || config.result_depth == 0 {
            return Err(Error::config("worker queue depths must be at least 1"));
        }
        let (frame_tx, frame_rx) = mpsc::channel(config.queue_depth);
        let (result_tx, result_rx) = mpsc::channel(config.result_depth);
        let coordinates = SharedCoordinates::new();
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let coordinates = coordinates.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("facelink-detect".into())
                .spawn(move || {
                    detection_loop(
                        detector,
                        frame_rx,
                        result_tx,
                        coordinates,
                        stop,
                        config.idle_backoff,
                    )
                })
                .map_err(|e| Error::resource(format!("failed to start detection thread: {e}")))?
        };
        info!(
            "detection worker started (queue depth {}, result depth {})",
            config.queue_depth, config.result_depth
        );

        let worker = Self {
            submitter: FrameSubmitter {
                tx: frame_tx,
                counters: Arc::new(SubmitCounters::default()),
            },
            coordinates,
            stop,
            thread: Some(thread),
        };
        Ok((worker, result_rx))
    }

    pub fn submitter(&self) -> FrameSubmitter {
        self.submitter.clone()
    }

    pub fn submit(&self, frame: VideoFrame) -> Result<bool> {
        self.submitter.submit(frame)
    }

    pub fn coordinates(&self) -> SharedCoordinates {
        self.coordinates.clone()
    }

    /// Stops the thread, waits for it and returns the final counters.
    pub fn shutdown(mut self) -> Result<WorkerStats> {
        self.stop.store(true, Ordering::Release);
        let counters = match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::internal("detection thread panicked"))?,
            None => ThreadCounters::default(),
        };
        let stats = WorkerStats {
            submitted: self.submitter.counters.submitted.load(Ordering::Relaxed),
            dropped: self.submitter.counters.dropped.load(Ordering::Relaxed),
            processed: counters.processed,
            failed: counters.failed,
            results_dropped: counters.results_dropped,
        };
        info!(?stats, "detection worker stopped");
        Ok(stats)
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn detection_loop<D: Detector>(
    mut detector: D,
    mut frames: mpsc::Receiver<VideoFrame>,
    results: mpsc::Sender<DetectionResult>,
    coordinates: SharedCoordinates,
    stop: Arc<AtomicBool>,
    idle_backoff: Duration,
) -> ThreadCounters {
    let mut counters = ThreadCounters::default();
    while !stop.load(Ordering::Acquire) {
        let frame = match frames.try_recv() {
            Ok(frame) => frame,
            Err(TryRecvError::Empty) => {
                thread::sleep(idle_backoff);
                continue;
            }
            Err(TryRecvError::Disconnected) => break,
        };

        let detection = match detector.detect(&frame) {
            Ok(detection) => detection,
            Err(e) => {
                counters.failed += 1;
                warn!("detector failed on frame at {} us: {}", frame.timestamp_us, e);
                continue;
            }
        };
        coordinates.set(detection.coordinates());
        counters.processed += 1;

        let result = DetectionResult {
            sequence: counters.processed,
            timestamp_us: frame.timestamp_us,
            detection,
        };
        if results.try_send(result).is_err() {
            counters.results_dropped += 1;
        }
    }
    debug!(processed = counters.processed, "detection loop exiting");
    counters
}
