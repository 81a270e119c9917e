//! Archive backend trait and shared error type.
//!
//! The pipeline only ever needs three things from a container format: the
//! list of entry names (for scanning), a full extraction, and building a new
//! flat archive from files on disk. Anything implementing [`ArchiveBackend`]
//! can stand in for [`ZipBackend`](super::zip_backend::ZipBackend).

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Entry name is not valid UTF-8 or has no file name: {0}")]
    InvalidName(PathBuf),
}

/// Result of [`ArchiveBackend::extract_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Files written (directory entries not counted).
    pub files: usize,
    /// File entries left out because their names would escape the destination.
    pub unsafe_entries: Vec<String>,
}

/// Trait for archive backends.
///
/// `Sync` so a single backend can be shared by reference across stages.
pub trait ArchiveBackend: Sync {
    /// Names of every entry in the archive, in central-directory order.
    fn list_entries(&self, path: &Path) -> Result<Vec<String>, ArchiveError>;

    /// Extract every entry under `dest`, keeping internal folders.
    fn extract_all(&self, path: &Path, dest: &Path) -> Result<Extraction, ArchiveError>;

    /// Write a new archive at `path` holding `files`, each stored under its
    /// base name. Returns the number of entries written.
    fn create(&self, path: &Path, files: &[PathBuf]) -> Result<usize, ArchiveError>;
}
