use std::time::{Duration, Instant};

use facelink_common::{Error, Result};

use super::FrameSource;
use crate::{Coordinates, Resolution, VideoFrame, RGB_BYTES_PER_PIXEL};

/// Pixels the square moves per frame.
const STEP: u32 = 4;
const SQUARE_COLOR: [u8; 3] = [255, 255, 255];
/// Background luma never exceeds this, so the square is the only bright area.
const BACKGROUND_MAX: u32 = 64;

/// Synthetic source: a white square bouncing across a dark gradient.
pub struct TestPatternSource {
    resolution: Resolution,
    fps: u32,
    square: u32,
    start: Instant,
    seq: u64,
}

impl TestPatternSource {
    pub fn new(resolution: Resolution, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(Error::config("test pattern fps must be non-zero"));
        }
        let square = resolution.width.min(resolution.height) / 4;
        if square == 0 {
            return Err(Error::config(format!(
                "resolution {resolution} is too small for the test pattern"
            )));
        }
        Ok(Self {
            resolution,
            fps,
            square,
            start: Instant::now(),
            seq: 0,
        })
    }

    /// Top-left corner of the square in frame `seq`.
    fn square_origin(&self, seq: u64) -> (u32, u32) {
        let travel = |span: u32| -> u32 {
            let range = span.saturating_sub(self.square) as u64;
            if range == 0 {
                return 0;
            }
            // Bounce between 0 and range.
            let pos = (seq * STEP as u64) % (2 * range);
            if pos <= range {
                pos as u32
            } else {
                (2 * range - pos) as u32
            }
        };
        (travel(self.resolution.width), travel(self.resolution.height) / 2)
    }

    /// Centre of the square in frame `seq`.
    pub fn square_center(&self, seq: u64) -> Coordinates {
        let (x0, y0) = self.square_origin(seq);
        let mid = (self.square as f32 - 1.0) / 2.0;
        Coordinates::new(x0 as f32 + mid, y0 as f32 + mid)
    }

    /// Renders frame `seq` without pacing.
    pub fn frame_at(&self, seq: u64) -> VideoFrame {
        let Resolution { width, height } = self.resolution;
        let (x0, y0) = self.square_origin(seq);
        let mut data = Vec::with_capacity(self.resolution.pixels() * RGB_BYTES_PER_PIXEL);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= x0 && x < x0 + self.square && y >= y0 && y < y0 + self.square;
                if inside {
                    data.extend_from_slice(&SQUARE_COLOR);
                } else {
                    let shade = (x * BACKGROUND_MAX / width.max(1)) as u8;
                    data.extend_from_slice(&[shade, shade / 2, (BACKGROUND_MAX as u8) - shade]);
                }
            }
        }
        let timestamp_us = seq * 1_000_000 / self.fps as u64;
        VideoFrame {
            width,
            height,
            timestamp_us,
            data,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn next_frame(&mut self) -> Result<VideoFrame> {
        let interval = Duration::from_secs_f64(1.0 / self.fps as f64);
        let target = self.start + interval.mul_f64(self.seq as f64);
        if let Some(wait) = target.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
        let frame = self.frame_at(self.seq);
        self.seq += 1;
        Ok(frame)
    }
}
