//! Archive reconstruction and verification.
//!
//! After conversion the output directory holds only the new JPEGs. Rebuilding
//! an archive is three steps:
//!
//! 1. **Merge**: move every passthrough file into the output directory under
//!    its base name. Internal folders are not kept; the result is flat.
//! 2. **Pack**: write every regular file directly under the output directory,
//!    sorted by name, into a new archive at the target path.
//! 3. **Verify**: compare the packed entry count with the number of files in
//!    the source archive. A difference is a warning; the archive is still
//!    delivered.

use crate::archive::{ArchiveBackend, ArchiveError};
use crate::types::{PassthroughFile, Stage, Warning};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error("Failed to move {path} into the output directory: {source}")]
    Merge {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write archive: {0}")]
    Pack(#[from] ArchiveError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RebuildError {
    /// Stage the archive was in when this error happened.
    pub fn stage(&self) -> Stage {
        match self {
            RebuildError::Merge { .. } => Stage::Merged,
            RebuildError::Pack(_) | RebuildError::Io(_) => Stage::Packed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebuildReport {
    pub packed: usize,
    pub expected: usize,
    /// `Some` when `packed != expected`.
    pub mismatch: Option<Warning>,
}

/// Merge, pack and verify. See the module docs.
pub fn rebuild(
    backend: &impl ArchiveBackend,
    output_dir: &Path,
    passthrough: &[PassthroughFile],
    target: &Path,
    expected: usize,
) -> Result<RebuildReport, RebuildError> {
    merge_passthrough(passthrough, output_dir)?;
    let packed = pack(backend, output_dir, target)?;
    let mismatch = verify(packed, expected);
    if mismatch.is_some() {
        warn!(archive = %target.display(), packed, expected, "entry count mismatch");
    }
    Ok(RebuildReport {
        packed,
        expected,
        mismatch,
    })
}

/// Move passthrough files into `output_dir`, flattening their paths.
pub fn merge_passthrough(
    passthrough: &[PassthroughFile],
    output_dir: &Path,
) -> Result<usize, RebuildError> {
    for file in passthrough {
        let Some(name) = file.current_path.file_name() else {
            continue;
        };
        let dest = output_dir.join(name);
        move_file(&file.current_path, &dest).map_err(|source| RebuildError::Merge {
            path: file.current_path.clone(),
            source,
        })?;
    }
    Ok(passthrough.len())
}

/// Rename, falling back to copy + delete across filesystems.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Regular files directly under `dir`, sorted by file name.
pub fn staged_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Pack the files directly under `output_dir` into a new archive at `target`.
pub fn pack(
    backend: &impl ArchiveBackend,
    output_dir: &Path,
    target: &Path,
) -> Result<usize, RebuildError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let files = staged_files(output_dir)?;
    let packed = backend.create(target, &files)?;
    debug!(archive = %target.display(), entries = packed, "packed");
    Ok(packed)
}

pub fn verify(packed: usize, expected: usize) -> Option<Warning> {
    (packed != expected).then_some(Warning::EntryCountMismatch {
        expected,
        actual: packed,
    })
}
