//! Detectors run by the detection worker.

use facelink_common::Result;
use image::Rgb;

use crate::{Coordinates, Detection, VideoFrame, RGB_BYTES_PER_PIXEL};

/// Finds a point of interest in a frame.
///
/// A detector is an owned handle; the worker thread keeps it for its whole
/// lifetime, so any model state lives inside the implementation.
pub trait Detector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection> {
        (**self).detect(frame)
    }
}

/// Never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderDetector;

impl Detector for PlaceholderDetector {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Detection> {
        Ok(Detection::Point(Coordinates::NONE))
    }
}

/// Centroid of all pixels brighter than a luma threshold.
#[derive(Debug, Clone, Copy)]
pub struct BrightnessDetector {
    threshold: u8,
    min_pixels: usize,
}

impl BrightnessDetector {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            min_pixels: 1,
        }
    }

    /// Report nothing unless at least `min_pixels` pixels pass the threshold.
    pub fn with_min_pixels(mut self, min_pixels: usize) -> Self {
        self.min_pixels = min_pixels.max(1);
        self
    }
}

impl Default for BrightnessDetector {
    fn default() -> Self {
        Self::new(200)
    }
}

/// BT.601 luma in integer arithmetic.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

impl Detector for BrightnessDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection> {
        let width = frame.width.max(1) as usize;
        let (mut sum_x, mut sum_y, mut count) = (0u64, 0u64, 0usize);
        for (i, px) in frame.data.chunks_exact(RGB_BYTES_PER_PIXEL).enumerate() {
            if luma([px[0], px[1], px[2]]) > self.threshold {
                sum_x += (i % width) as u64;
                sum_y += (i / width) as u64;
                count += 1;
            }
        }
        if count < self.min_pixels {
            return Ok(Detection::Point(Coordinates::NONE));
        }
        Ok(Detection::Point(Coordinates::new(
            sum_x as f32 / count as f32,
            sum_y as f32 / count as f32,
        )))
    }
}

/// Runs the inner detector and draws a crosshair on a copy of the frame.
pub struct Annotate<D> {
    inner: D,
    color: [u8; 3],
    arm: u32,
}

impl<D: Detector> Annotate<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            color: [255, 0, 0],
            arm: 8,
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }
}

impl<D: Detector> Detector for Annotate<D> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Detection> {
        let coordinates = self.inner.detect(frame)?.coordinates();
        let mut image = frame.to_image()?;
        if coordinates.is_found() {
            let (w, h) = image.dimensions();
            let cx = coordinates.x.round() as i64;
            let cy = coordinates.y.round() as i64;
            let arm = self.arm as i64;
            for d in -arm..=arm {
                for (x, y) in [(cx + d, cy), (cx, cy + d)] {
                    if (0..w as i64).contains(&x) && (0..h as i64).contains(&y) {
                        image.put_pixel(x as u32, y as u32, Rgb(self.color));
                    }
                }
            }
        }
        Ok(Detection::Annotated {
            coordinates,
            frame: VideoFrame::from_image(image, frame.timestamp_us),
        })
    }
}
