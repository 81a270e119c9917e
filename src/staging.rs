//! Scratch directories for one archive at a time.
//!
//! ```text
//! <scratch>/
//! ├── extracted/     # full extraction of the current archive
//! ├── passthrough/   # non-image files, already under their flat names
//! └── converted/     # new JPEGs; becomes the content of the rebuilt archive
//! ```
//!
//! The directories are owned by a single run. They are emptied after every
//! archive, and removed at the end of the run. Leftovers found at startup
//! come from an interrupted run and are cleared.

use crate::archive::{ArchiveBackend, ArchiveError, Extraction};
use crate::config::NamingConfig;
use crate::formats::FormatFilter;
use crate::rebuild::move_file;
use crate::types::{ConvertibleFile, PassthroughFile, Warning};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct StagingArea {
    pub root: PathBuf,
    pub extracted: PathBuf,
    pub passthrough: PathBuf,
    pub converted: PathBuf,
}

/// Extracted files sorted into the two processing paths.
#[derive(Debug, Default)]
pub struct Classification {
    pub convertible: Vec<ConvertibleFile>,
    pub passthrough: Vec<PassthroughFile>,
    /// Every file extracted from the archive, including dropped duplicates.
    pub original_files: usize,
    /// Total bytes of the convertible files.
    pub original_size: u64,
    pub warnings: Vec<Warning>,
}

impl StagingArea {
    pub fn new(scratch: &Path) -> Self {
        Self {
            root: scratch.to_path_buf(),
            extracted: scratch.join("extracted"),
            passthrough: scratch.join("passthrough"),
            converted: scratch.join("converted"),
        }
    }

    fn dirs(&self) -> [&Path; 3] {
        [&self.extracted, &self.passthrough, &self.converted]
    }

    /// Create the staging directories. Returns `true` when any of them
    /// already held files, which are removed.
    pub fn prepare(&self) -> io::Result<bool> {
        let mut stale = false;
        for dir in self.dirs() {
            if dir.exists() && fs::read_dir(dir)?.next().is_some() {
                stale = true;
                fs::remove_dir_all(dir)?;
            }
            fs::create_dir_all(dir)?;
        }
        Ok(stale)
    }

    pub fn extract(
        &self,
        backend: &impl ArchiveBackend,
        archive: &Path,
    ) -> Result<Extraction, ArchiveError> {
        backend.extract_all(archive, &self.extracted)
    }

    /// Walk the extraction and assign every file its flat output name.
    ///
    /// Convertible files stay where they are and get `<stem>.jpg`. Other
    /// files are moved into `passthrough/` under their base name. When two
    /// files claim the same name, the first in walk order keeps it; later
    /// ones are renamed or dropped according to `naming`.
    pub fn classify(
        &self,
        filter: &FormatFilter,
        naming: &NamingConfig,
    ) -> io::Result<Classification> {
        let mut result = Classification::default();
        let mut taken: HashSet<String> = HashSet::new();

        for entry in WalkDir::new(&self.extracted).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            result.original_files += 1;

            let path = entry.path();
            let entry_name = entry_name(&self.extracted, path);
            let file_name = entry.file_name().to_string_lossy().to_string();
            let convertible = filter.is_convertible(&file_name);
            let wanted = if convertible {
                jpeg_name(path)
            } else {
                file_name
            };

            let name = if taken.contains(&wanted) {
                let renamed = naming
                    .disambiguate_collisions
                    .then(|| free_name(&wanted, &taken));
                warn!(entry = %entry_name, name = %wanted, renamed = ?renamed, "name collision");
                result.warnings.push(Warning::NameCollision {
                    name: wanted,
                    entry: entry_name.clone(),
                    renamed_to: renamed.clone(),
                });
                match renamed {
                    Some(name) => name,
                    None => continue,
                }
            } else {
                wanted
            };
            taken.insert(name.clone());

            if convertible {
                let original_size = entry.metadata().map_err(io::Error::from)?.len();
                result.original_size += original_size;
                result.convertible.push(ConvertibleFile {
                    source_path: path.to_path_buf(),
                    original_size,
                    output_name: name,
                });
            } else {
                let current_path = self.passthrough.join(&name);
                move_file(path, &current_path)?;
                result.passthrough.push(PassthroughFile {
                    current_path,
                    original_entry_name: entry_name,
                });
            }
        }

        debug!(
            files = result.original_files,
            convertible = result.convertible.len(),
            passthrough = result.passthrough.len(),
            "classified"
        );
        Ok(result)
    }

    /// Empty every staging directory. Failures are returned as warnings.
    pub fn cleanup(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for dir in self.dirs() {
            let result = remove_if_present(dir).and_then(|()| fs::create_dir_all(dir));
            if let Err(e) = result {
                warn!(path = %dir.display(), error = %e, "cleanup failed");
                warnings.push(Warning::CleanupFailed {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
        warnings
    }

    /// Remove the staging directories, then the scratch root if it is empty.
    pub fn remove(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for dir in self.dirs() {
            if let Err(e) = remove_if_present(dir) {
                warnings.push(Warning::CleanupFailed {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
        let empty = fs::read_dir(&self.root).is_ok_and(|mut d| d.next().is_none());
        if empty {
            if let Err(e) = fs::remove_dir(&self.root) {
                warnings.push(Warning::CleanupFailed {
                    path: self.root.clone(),
                    reason: e.to_string(),
                });
            }
        }
        warnings
    }
}

fn remove_if_present(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Path of `path` relative to `root`, with `/` separators.
fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `<stem>.jpg`
fn jpeg_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}.jpg")
}

/// `<n>-<name>` with the smallest free `n >= 1`.
fn free_name(name: &str, taken: &HashSet<String>) -> String {
    (1..)
        .map(|n| format!("{n}-{name}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
