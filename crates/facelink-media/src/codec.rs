//! H.264 over openh264.

use facelink_common::{Error, Result};
use openh264::decoder::Decoder as RawDecoder;
use openh264::encoder::{
    BitRate, Encoder as RawEncoder, EncoderConfig, FrameRate, FrameType, RateControlMode,
    UsageType,
};
use openh264::formats::{RgbSliceU8, YUVBuffer, YUVSource};
use openh264::OpenH264API;
use tracing::debug;

use crate::{Decoder, EncodedFrame, Encoder, Resolution, VideoFrame, RGB_BYTES_PER_PIXEL};

const NAL_TYPE_IDR: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct H264Config {
    pub resolution: Resolution,
    pub fps: u32,
    pub bitrate_kbps: u32,
    /// Force a keyframe after this many frames; 0 leaves it to the encoder.
    pub keyframe_interval: u32,
}

impl Default for H264Config {
    fn default() -> Self {
        Self {
            resolution: Resolution::new(640, 480),
            fps: 30,
            bitrate_kbps: 1_000,
            keyframe_interval: 60,
        }
    }
}

pub struct H264Encoder {
    encoder: RawEncoder,
    config: H264Config,
    frames_since_keyframe: u32,
}

impl H264Encoder {
    pub fn new(config: H264Config) -> Result<Self> {
        if config.fps == 0 || config.bitrate_kbps == 0 {
            return Err(Error::config("encoder fps and bitrate must be non-zero"));
        }
        let cfg = EncoderConfig::new()
            .usage_type(UsageType::CameraVideoRealTime)
            .max_frame_rate(FrameRate::from_hz(config.fps as f32))
            .bitrate(BitRate::from_bps(config.bitrate_kbps.saturating_mul(1000)))
            .rate_control_mode(RateControlMode::Bitrate);
        let encoder = RawEncoder::with_api_config(OpenH264API::from_source(), cfg)
            .map_err(|e| Error::resource(format!("failed to create H.264 encoder: {e}")))?;
        debug!(
            "H.264 encoder ready: {} @ {} fps, {} kbps",
            config.resolution, config.fps, config.bitrate_kbps
        );
        Ok(Self {
            encoder,
            config,
            frames_since_keyframe: 0,
        })
    }
}

impl Encoder for H264Encoder {
    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedFrame> {
        if frame.width % 2 != 0 || frame.height % 2 != 0 || frame.width == 0 || frame.height == 0 {
            return Err(Error::media(format!(
                "H.264 needs even, non-zero dimensions, got {}",
                frame.resolution()
            )));
        }
        let expected = frame.resolution().pixels() * RGB_BYTES_PER_PIXEL;
        if frame.data.len() != expected {
            return Err(Error::media(format!(
                "frame buffer holds {} bytes, expected {}",
                frame.data.len(),
                expected
            )));
        }

        let interval = self.config.keyframe_interval;
        if interval > 0 && self.frames_since_keyframe >= interval {
            self.encoder.force_intra_frame();
        }

        let rgb = RgbSliceU8::new(&frame.data, (frame.width as usize, frame.height as usize));
        let yuv = YUVBuffer::from_rgb_source(rgb);
        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| Error::media(format!("H.264 encode failed: {e}")))?;

        let keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        let data = bitstream.to_vec();
        if keyframe {
            self.frames_since_keyframe = 0;
        } else {
            self.frames_since_keyframe += 1;
        }

        Ok(EncodedFrame {
            timestamp_us: frame.timestamp_us,
            keyframe,
            data,
        })
    }

    fn request_keyframe(&mut self) {
        self.encoder.force_intra_frame();
    }
}

pub struct H264Decoder {
    decoder: RawDecoder,
}

impl H264Decoder {
    pub fn new() -> Result<Self> {
        let decoder = RawDecoder::new()
            .map_err(|e| Error::resource(format!("failed to create H.264 decoder: {e}")))?;
        Ok(Self { decoder })
    }
}

impl Decoder for H264Decoder {
    fn decode(&mut self, unit: &EncodedFrame) -> Result<Option<VideoFrame>> {
        let Some(yuv) = self
            .decoder
            .decode(&unit.data)
            .map_err(|e| Error::media(format!("H.264 decode failed: {e}")))?
        else {
            return Ok(None);
        };

        let (width, height) = yuv.dimensions();
        let mut data = vec![0u8; width * height * RGB_BYTES_PER_PIXEL];
        yuv.write_rgb8(&mut data);
        VideoFrame::new(width as u32, height as u32, unit.timestamp_us, data).map(Some)
    }
}

/// NAL unit types of an Annex B byte stream, in order.
pub fn nal_unit_types(data: &[u8]) -> Vec<u8> {
    let mut types = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if let Some(header) = data.get(i + 3) {
                types.push(header & 0x1f);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    types
}

/// Whether the access unit carries an IDR slice.
pub fn contains_idr(data: &[u8]) -> bool {
    nal_unit_types(data).contains(&NAL_TYPE_IDR)
}
