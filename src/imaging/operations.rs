//! File-level conversion: read → decode → encode → write.

use super::backend::{BackendError, ImageBackend};
use super::params::JpegParams;
use std::fs;
use std::path::Path;

/// Convert one source image into a JPEG at `output`.
///
/// Overwrites `output` if it exists. The JPEG is written next to it as
/// `<stem>.part` and renamed into place, so `output` is never truncated.
/// Returns the number of bytes written.
pub fn convert_file(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    params: &JpegParams,
) -> Result<u64, BackendError> {
    let bytes = fs::read(source)?;
    let pixels = backend.decode(&bytes)?;
    let jpeg = backend.encode_jpeg(&pixels, params)?;

    let partial = output.with_extension("part");
    if let Err(e) = fs::write(&partial, &jpeg).and_then(|()| fs::rename(&partial, output)) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(jpeg.len() as u64)
}
