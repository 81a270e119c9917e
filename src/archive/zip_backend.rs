//! Zip backend on the `zip` crate.
//!
//! Extraction refuses entries whose names would escape the destination
//! (`../`, absolute paths) via `ZipFile::enclosed_name`. Such file entries
//! are skipped and returned in [`Extraction::unsafe_entries`].

use super::backend::{ArchiveBackend, ArchiveError, Extraction};
use crate::config::Compression;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Zip archive backend. `compression` applies to archives it creates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipBackend {
    pub compression: Compression,
}

impl ZipBackend {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    fn method(&self) -> CompressionMethod {
        match self.compression {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        }
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

impl ArchiveBackend for ZipBackend {
    fn list_entries(&self, path: &Path) -> Result<Vec<String>, ArchiveError> {
        let archive = open_archive(path)?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    fn extract_all(&self, path: &Path, dest: &Path) -> Result<Extraction, ArchiveError> {
        let mut archive = open_archive(path)?;
        let mut extraction = Extraction::default();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                warn!(
                    entry = entry.name(),
                    archive = %path.display(),
                    "skipping unsafe entry name"
                );
                if !entry.is_dir() {
                    extraction.unsafe_entries.push(entry.name().to_string());
                }
                continue;
            };
            let output_path = dest.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&output_path)?;
                continue;
            }
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&output_path)?;
            std::io::copy(&mut entry, &mut outfile)?;
            extraction.files += 1;
        }

        debug!(
            archive = %path.display(),
            files = extraction.files,
            skipped = extraction.unsafe_entries.len(),
            "extracted"
        );
        Ok(extraction)
    }

    fn create(&self, path: &Path, files: &[PathBuf]) -> Result<usize, ArchiveError> {
        let file = File::create(path)?;
        let mut writer = ZipWriter::new(BufWriter::new(file));

        for source in files {
            let name = source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ArchiveError::InvalidName(source.clone()))?;
            let size = fs::metadata(source)?.len();
            let options = SimpleFileOptions::default()
                .compression_method(self.method())
                .large_file(size >= u64::from(u32::MAX));

            writer.start_file(name, options)?;
            let mut input = File::open(source)?;
            std::io::copy(&mut input, &mut writer)?;
        }

        writer.finish()?;
        Ok(files.len())
    }
}
