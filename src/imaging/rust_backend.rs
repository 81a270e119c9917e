//! Pure Rust codec backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, WebP, BMP/DIB, TIFF, JPEG) | `image::ImageReader::with_guessed_format` |
//! | Convert to RGB | `DynamicImage::to_rgb8` |
//! | Encode → JPEG | `jpeg_encoder::Encoder` |
//!
//! Formats are sniffed from the bytes, not the entry name, so a `.dib` (a BMP
//! without its file header in the wild, but usually a plain BMP inside comic
//! archives) or a mislabelled PNG still decodes.
//!
//! Decoding runs under `image::Limits`. The decoders check a header's
//! dimensions against the limits before allocating, so a limit hit means a
//! corrupt or oversized page and is an ordinary decode failure for that one
//! file. [`BackendError::ResourceExhausted`] is kept for allocations that
//! actually fail.

use super::backend::{BackendError, ImageBackend};
use super::params::JpegParams;
use image::{ImageError, ImageReader, Limits, RgbImage};
use jpeg_encoder::{ColorType, Encoder};
use std::io::{Cursor, ErrorKind};

/// Pure Rust backend using `image` for decoding and `jpeg-encoder` for output.
pub struct RustBackend {
    limits: Limits,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_decode_error(err: ImageError) -> BackendError {
    match err {
        ImageError::IoError(e) if e.kind() == ErrorKind::OutOfMemory => {
            BackendError::ResourceExhausted(e.to_string())
        }
        ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::Decode(other.to_string()),
    }
}

/// Make sure the RGB copy of a `width × height` image can be allocated.
fn reserve_rgb(width: u32, height: u32) -> Result<(), BackendError> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| BackendError::Decode(format!("{width}x{height} is too large")))?;
    Vec::<u8>::new()
        .try_reserve_exact(len)
        .map_err(|e| BackendError::ResourceExhausted(e.to_string()))
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, BackendError> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        if reader.format().is_none() {
            return Err(BackendError::Decode("unrecognized image format".into()));
        }
        reader.limits(self.limits.clone());
        let img = reader.decode().map_err(map_decode_error)?;
        if let image::DynamicImage::ImageRgb8(rgb) = img {
            return Ok(rgb);
        }
        reserve_rgb(img.width(), img.height())?;
        Ok(img.to_rgb8())
    }

    fn encode_jpeg(&self, pixels: &RgbImage, params: &JpegParams) -> Result<Vec<u8>, BackendError> {
        let (width, height) = pixels.dimensions();
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(BackendError::Encode(format!(
                "{width}x{height} exceeds the JPEG maximum of 65535 pixels per side"
            )));
        };

        let mut out = Vec::new();
        let mut encoder = Encoder::new(&mut out, params.quality.value());
        encoder.set_optimized_huffman_tables(params.optimize);
        encoder.set_progressive(params.progressive);
        encoder
            .encode(pixels.as_raw(), w, h, ColorType::Rgb)
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(out)
    }
}
