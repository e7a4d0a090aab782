//! The `JpegDecoder` capability boundary and a `turbojpeg`-backed
//! implementation.

use crate::config::{PixelBuffer, PixelFormat};
use crate::error::{DecodeError, DecodeResult};

pub trait JpegDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> DecodeResult<PixelBuffer>;
}

/// Decodes to RGB24 via `libturbojpeg` (through the safe `turbojpeg` crate).
pub struct TurboJpegDecoder {
    decompressor: std::sync::Mutex<turbojpeg::Decompressor>,
}

impl TurboJpegDecoder {
    pub fn new() -> DecodeResult<Self> {
        let decompressor =
            turbojpeg::Decompressor::new().map_err(|e| DecodeError::Failed(e.to_string()))?;
        Ok(TurboJpegDecoder {
            decompressor: std::sync::Mutex::new(decompressor),
        })
    }
}

impl JpegDecoder for TurboJpegDecoder {
    fn decode(&self, bytes: &[u8]) -> DecodeResult<PixelBuffer> {
        let mut decompressor = self
            .decompressor
            .lock()
            .map_err(|_| DecodeError::Failed("decompressor mutex poisoned".to_string()))?;

        let header = decompressor
            .read_header(bytes)
            .map_err(|e| DecodeError::Failed(e.to_string()))?;

        let mut image = turbojpeg::Image {
            pixels: vec![0u8; header.width * header.height * 3],
            width: header.width,
            pitch: header.width * 3,
            height: header.height,
            format: turbojpeg::PixelFormat::RGB,
        };

        decompressor
            .decompress(bytes, image.as_deref_mut())
            .map_err(|e| DecodeError::Failed(e.to_string()))?;

        Ok(PixelBuffer {
            width: header.width as u32,
            height: header.height as u32,
            pixel_format: PixelFormat::Rgb24,
            bytes: image.pixels,
        })
    }
}
