//! Media pipeline pieces for facelink.
//!
//! Frames travel as packed RGB24 [`VideoFrame`]s and as H.264 access units
//! ([`EncodedFrame`]). The sending side pulls frames from a
//! [`source::FrameSource`] and encodes them; the receiving side decodes
//! units from a [`VideoFeed`] in [`relay::run_receive_stage`] and hands the
//! frames to a [`worker::DetectionWorker`] running on its own thread.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use facelink_common::{Error, Result};
use image::RgbImage;

pub mod codec;
pub mod detect;
pub mod relay;
pub mod sink;
pub mod source;
pub mod worker;

pub use codec::{H264Config, H264Decoder, H264Encoder};
pub use detect::{Annotate, BrightnessDetector, Detector, PlaceholderDetector};
pub use worker::{DetectionWorker, FrameSubmitter, SharedCoordinates, WorkerConfig, WorkerStats};

/// Bytes per pixel of a packed RGB24 raster.
pub const RGB_BYTES_PER_PIXEL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One decoded picture, packed RGB24, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Wraps `data`, checking it holds exactly `width * height` RGB pixels.
    pub fn new(width: u32, height: u32, timestamp_us: u64, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * RGB_BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(Error::media(format!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            timestamp_us,
            data,
        })
    }

    /// A frame filled with a single colour.
    pub fn filled(resolution: Resolution, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(resolution.pixels() * RGB_BYTES_PER_PIXEL)
            .collect();
        Self {
            width: resolution.width,
            height: resolution.height,
            timestamp_us: 0,
            data,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// RGB value at (`x`, `y`), `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * RGB_BYTES_PER_PIXEL;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| Error::media("frame buffer does not match its dimensions"))
    }

    pub fn from_image(image: RgbImage, timestamp_us: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            timestamp_us,
            data: image.into_raw(),
        }
    }
}

/// One H.264 access unit in Annex B framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub timestamp_us: u64,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

/// A detection point in frame pixels. `(-1, -1)` means nothing was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub x: f32,
    pub y: f32,
}

impl Coordinates {
    pub const NONE: Coordinates = Coordinates { x: -1.0, y: -1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_found(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// What a detector reports for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Point(Coordinates),
    /// The point plus a copy of the frame with the detection drawn on it.
    Annotated {
        coordinates: Coordinates,
        frame: VideoFrame,
    },
}

impl Detection {
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Detection::Point(c) => *c,
            Detection::Annotated { coordinates, .. } => *coordinates,
        }
    }

    pub fn frame(&self) -> Option<&VideoFrame> {
        match self {
            Detection::Point(_) => None,
            Detection::Annotated { frame, .. } => Some(frame),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// 1-based count of frames the worker has processed.
    pub sequence: u64,
    pub timestamp_us: u64,
    pub detection: Detection,
}

pub trait Encoder: Send {
    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedFrame>;

    /// Makes the next encoded frame a keyframe.
    fn request_keyframe(&mut self);
}

/// Keyframe request raised by the network side (RTCP PLI/FIR) and consumed
/// by whoever drives the encoder.
#[derive(Debug, Clone, Default)]
pub struct KeyframeRequest(Arc<AtomicBool>);

impl KeyframeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the request and reports whether one was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

pub trait Decoder: Send {
    /// Decodes one access unit. `Ok(None)` while the decoder has no picture yet.
    fn decode(&mut self, unit: &EncodedFrame) -> Result<Option<VideoFrame>>;
}

/// Pull side of an incoming video stream.
#[async_trait]
pub trait VideoFeed: Send {
    /// Next complete access unit; `Ok(None)` once the stream has ended.
    async fn next_unit(&mut self) -> Result<Option<EncodedFrame>>;
}
