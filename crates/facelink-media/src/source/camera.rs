use std::time::Instant;

use facelink_common::{Error, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as CameraResolution,
};
use nokhwa::Camera;
use tracing::info;

use super::FrameSource;
use crate::{Resolution, VideoFrame};

/// Webcam capture through nokhwa.
///
/// The camera handle is not `Send`; open it on the thread that reads it.
pub struct CameraSource {
    camera: Camera,
    resolution: Resolution,
    start: Instant,
}

impl CameraSource {
    /// Opens device `index` and starts streaming, asking for the closest
    /// format to `resolution` at `fps`.
    pub fn open(index: u32, resolution: Resolution, fps: u32) -> Result<Self> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                CameraResolution::new(resolution.width, resolution.height),
                FrameFormat::MJPEG,
                fps,
            ),
        ));
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| Error::resource(format!("failed to open camera {index}: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| Error::resource(format!("failed to start camera {index}: {e}")))?;

        let actual = camera.resolution();
        let resolution = Resolution::new(actual.width(), actual.height());
        info!(
            "camera {} streaming {} @ {} fps",
            index,
            resolution,
            camera.frame_rate()
        );
        Ok(Self {
            camera,
            resolution,
            start: Instant::now(),
        })
    }
}

impl FrameSource for CameraSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn next_frame(&mut self) -> Result<VideoFrame> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| Error::media(format!("failed to read from camera: {e}")))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::media(format!("failed to decode camera frame: {e}")))?;
        let (width, height) = (image.width(), image.height());
        let timestamp_us = self.start.elapsed().as_micros() as u64;
        VideoFrame::new(width, height, timestamp_us, image.into_raw())
    }
}
