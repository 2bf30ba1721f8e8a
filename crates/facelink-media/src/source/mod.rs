//! Blocking frame producers for the sending side.
//!
//! Sources are driven from a dedicated OS thread; `next_frame` blocks until
//! the next picture is due.

#[cfg(feature = "camera")]
mod camera;
mod pattern;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use pattern::TestPatternSource;

use facelink_common::Result;

use crate::{Resolution, VideoFrame};

pub trait FrameSource {
    fn resolution(&self) -> Resolution;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<VideoFrame>;
}
