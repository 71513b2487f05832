//! Image codec adapter: encoded bytes <-> pixel buffer

use crate::error::CodecError;
use crate::frame::Frame;
use image::codecs::jpeg::JpegEncoder;

/// Turns compressed image bytes into a frame and back. Stateless.
pub trait FrameCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError>;
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CodecError>;
}

/// Accepts any format the `image` crate can sniff, always emits JPEG
#[derive(Debug, Clone)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameCodec for JpegCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Frame::new(image.to_rgb8()))
    }

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode_image(frame.pixels())
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}
