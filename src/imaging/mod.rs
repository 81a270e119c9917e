//! Image re-encoding in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** (WebP, PNG, BMP/DIB, TIFF) | `image::ImageReader` with format sniffing |
//! | **Colour model** | `DynamicImage::to_rgb8` (alpha dropped) |
//! | **Encode → JPEG** | `jpeg_encoder::Encoder` (quality, optimized Huffman, progressive) |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`] and [`JpegParams`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`convert_file`], the read → decode → encode → write step

pub mod backend;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use operations::convert_file;
pub use params::{JpegParams, Quality};
pub use rust_backend::RustBackend;
