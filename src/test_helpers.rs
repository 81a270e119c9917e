//! Shared test fixtures: zip archives and encoded images built in memory.
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! write_zip(&tmp.path().join("book.cbz"), &[
//!     ("ch1/", b"".as_slice()),                 // directory entry
//!     ("ch1/01.png", &encode_test_image(ImageFormat::Png, 8, 8)),
//!     ("ComicInfo.xml", b"<ComicInfo/>".as_slice()),
//! ]);
//! ```

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Write a zip archive at `path`. Names ending in `/` become directory
/// entries; everything else is a stored file.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
    }
    writer.finish().unwrap();
}

/// RGBA image with a horizontal gradient and a vertical alpha ramp.
pub fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let a = 255 - (y * 128 / height.max(1)) as u8;
        Rgba([r, g, 128, a])
    });
    DynamicImage::ImageRgba8(img)
}

/// A `width × height` gradient encoded in `format`.
pub fn encode_test_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    gradient_rgba(width, height)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// A PNG whose header claims `width × height` RGB pixels, followed by a
/// garbage data chunk. Every chunk has a valid CRC, so decoders get past the
/// header before failing.
pub fn oversized_png(width: u32, height: u32) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // 8-bit RGB, deflate, adaptive filtering, no interlace
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png_chunk(&mut png, b"IHDR", &ihdr);
    png_chunk(&mut png, b"IDAT", b"not deflate data at all");
    png_chunk(&mut png, b"IEND", &[]);
    png
}

fn png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let crc = crc32(kind.iter().chain(data));
    out.extend_from_slice(&crc.to_be_bytes());
}

fn crc32<'a>(bytes: impl Iterator<Item = &'a u8>) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
