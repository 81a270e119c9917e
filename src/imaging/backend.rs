//! Image codec trait and shared error type.
//!
//! The [`ImageBackend`] trait defines the two operations the converter needs:
//! decode arbitrary raster bytes into an RGB buffer, and encode an RGB buffer
//! as JPEG. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::JpegParams;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl BackendError {
    /// Whether this failure must stop the whole run rather than one file.
    pub fn is_fatal(&self) -> bool {
        match self {
            BackendError::ResourceExhausted(_) => true,
            BackendError::Io(e) => e.kind() == std::io::ErrorKind::OutOfMemory,
            _ => false,
        }
    }
}

/// Trait for image codec backends.
///
/// `Sync` because one backend is shared by every worker of a pool run.
pub trait ImageBackend: Sync {
    /// Decode an encoded image into 8-bit RGB. Alpha is discarded.
    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, BackendError>;

    /// Encode an RGB buffer as a complete JPEG file.
    fn encode_jpeg(&self, pixels: &RgbImage, params: &JpegParams) -> Result<Vec<u8>, BackendError>;
}
