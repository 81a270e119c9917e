//! Zip container access: listing, extraction and repacking.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **List** | `zip::ZipArchive::file_names` |
//! | **Extract** | `ZipFile::enclosed_name` + `std::io::copy` |
//! | **Create** | `zip::ZipWriter` (stored or deflated) |
//!
//! The module is split into:
//! - **Backend**: [`ArchiveBackend`] trait + [`ArchiveError`]
//! - **Zip**: [`ZipBackend`], the production implementation

pub mod backend;
pub mod zip_backend;

pub use backend::{ArchiveBackend, ArchiveError, Extraction};
pub use zip_backend::ZipBackend;
