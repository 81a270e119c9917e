//! Archive discovery.
//!
//! Walks the source tree once, before any conversion starts, and selects the
//! archives worth converting.
//!
//! ## Selection
//!
//! A file is an archive candidate when:
//! - its extension is in `formats.archives` (`.cbz`, `.zip` by default)
//! - it opens as a zip archive
//! - at least `scan.threshold` of its entries have a convertible extension
//!
//! Counting stops as soon as the threshold is reached, so a 500-page volume
//! costs no more than a 1-page one once it qualifies.
//!
//! ## Failures
//!
//! An archive that cannot be opened is not skipped silently: it becomes an
//! [`Warning::UnreadableArchive`] in the [`ScanReport`] and the walk goes on.
//! The same holds for directory entries the walk cannot read.
//!
//! ## Order
//!
//! Entries are visited sorted by file name within each directory, so the
//! candidate list is deterministic across runs and platforms.

use crate::archive::ArchiveBackend;
use crate::formats::FormatFilter;
use crate::types::{ArchiveCandidate, Warning};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Candidates plus every archive that could not be inspected.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub candidates: Vec<ArchiveCandidate>,
    pub warnings: Vec<Warning>,
    /// Archives opened and inspected, selected or not.
    pub inspected: usize,
}

pub fn scan(
    root: &Path,
    filter: &FormatFilter,
    threshold: usize,
    backend: &impl ArchiveBackend,
) -> Result<ScanReport, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut report = ScanReport::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                warn!(path = %path.display(), error = %e, "cannot read directory entry");
                report.warnings.push(Warning::UnreadableArchive {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !filter.is_archive(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let names = match backend.list_entries(path) {
            Ok(names) => names,
            Err(e) => {
                warn!(archive = %path.display(), error = %e, "cannot open archive");
                report.warnings.push(Warning::UnreadableArchive {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        report.inspected += 1;

        let matched = count_matches(&names, filter, threshold);
        debug!(archive = %path.display(), matched, threshold, "inspected");
        if matched >= threshold {
            report.candidates.push(ArchiveCandidate {
                path: path.to_path_buf(),
                matched_entries: matched,
            });
        }
    }

    Ok(report)
}

/// Count convertible entry names, stopping once `threshold` is reached.
pub fn count_matches(names: &[String], filter: &FormatFilter, threshold: usize) -> usize {
    names
        .iter()
        .filter(|name| filter.is_convertible(name))
        .take(threshold)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipBackend;
    use crate::archive::backend::tests::{MockArchive, RecordedOp};
    use crate::config::FormatsConfig;
    use crate::test_helpers::write_zip;
    use std::fs;
    use tempfile::TempDir;

    fn filter() -> FormatFilter {
        FormatFilter::new(&FormatsConfig::default())
    }

    /// Archive with `images` PNG entries and one text entry.
    fn archive_with(path: &Path, images: usize) {
        let mut entries: Vec<(String, &[u8])> = (0..images)
            .map(|i| (format!("page{i:02}.png"), b"png".as_slice()))
            .collect();
        entries.push(("info.txt".to_string(), b"txt".as_slice()));
        let borrowed: Vec<(&str, &[u8])> =
            entries.iter().map(|(n, b)| (n.as_str(), *b)).collect();
        write_zip(path, &borrowed);
    }

    fn candidate_names(report: &ScanReport) -> Vec<String> {
        report
            .candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn threshold_boundaries() {
        let tmp = TempDir::new().unwrap();
        let threshold = 3;
        archive_with(&tmp.path().join("a-zero.cbz"), 0);
        archive_with(&tmp.path().join("b-below.cbz"), threshold - 1);
        archive_with(&tmp.path().join("c-exact.cbz"), threshold);
        archive_with(&tmp.path().join("d-above.cbz"), threshold + 1);

        let report = scan(tmp.path(), &filter(), threshold, &ZipBackend::default()).unwrap();
        assert_eq!(candidate_names(&report), vec!["c-exact.cbz", "d-above.cbz"]);
        assert_eq!(report.inspected, 4);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn count_short_circuits_at_threshold() {
        let tmp = TempDir::new().unwrap();
        archive_with(&tmp.path().join("big.cbz"), 10);

        let report = scan(tmp.path(), &filter(), 2, &ZipBackend::default()).unwrap();
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].matched_entries, 2);
    }

    #[test]
    fn zero_threshold_selects_every_readable_archive() {
        let tmp = TempDir::new().unwrap();
        archive_with(&tmp.path().join("text-only.zip"), 0);

        let report = scan(tmp.path(), &filter(), 0, &ZipBackend::default()).unwrap();
        assert_eq!(candidate_names(&report), vec!["text-only.zip"]);
    }

    #[test]
    fn walks_subdirectories_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("series/vol2")).unwrap();
        fs::create_dir_all(tmp.path().join("series/vol1")).unwrap();
        archive_with(&tmp.path().join("series/vol2/b.cbz"), 1);
        archive_with(&tmp.path().join("series/vol1/a.cbz"), 1);
        archive_with(&tmp.path().join("z.zip"), 1);

        let report = scan(tmp.path(), &filter(), 1, &ZipBackend::default()).unwrap();
        assert_eq!(candidate_names(&report), vec!["a.cbz", "b.cbz", "z.zip"]);
        assert!(report.candidates.iter().all(|c| c.path.starts_with(tmp.path())));
    }

    #[test]
    fn ignores_non_archive_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cover.png"), b"png").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"text").unwrap();
        let backend = MockArchive::default();

        let report = scan(tmp.path(), &filter(), 1, &backend).unwrap();
        assert!(report.candidates.is_empty());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn corrupt_archive_is_reported_and_scan_continues() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a-broken.cbz"), b"not a zip").unwrap();
        archive_with(&tmp.path().join("b-good.cbz"), 2);
        let backend = MockArchive::default();

        let report = scan(tmp.path(), &filter(), 1, &backend).unwrap();
        assert_eq!(candidate_names(&report), vec!["b-good.cbz"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            Warning::UnreadableArchive { path, .. } if path.ends_with("a-broken.cbz")
        ));
        // Both archives were attempted
        assert_eq!(
            backend
                .get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::List(_)))
                .count(),
            2
        );
    }

    #[test]
    fn nested_entries_count() {
        let tmp = TempDir::new().unwrap();
        write_zip(
            &tmp.path().join("nested.cbz"),
            &[
                ("ch1/", b"".as_slice()),
                ("ch1/01.webp", b"x".as_slice()),
                ("ch2/01.TIF", b"y".as_slice()),
            ],
        );

        let report = scan(tmp.path(), &filter(), 2, &ZipBackend::default()).unwrap();
        assert_eq!(report.candidates.len(), 1);
    }

    #[test]
    fn missing_root_is_error() {
        let result = scan(
            Path::new("/nonexistent/library"),
            &filter(),
            1,
            &ZipBackend::default(),
        );
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn count_matches_stops_early() {
        let names: Vec<String> = ["a.png", "b.txt", "c.webp", "d.bmp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(count_matches(&names, &filter(), 2), 2);
        assert_eq!(count_matches(&names, &filter(), 10), 3);
        assert_eq!(count_matches(&names, &filter(), 0), 0);
    }
}
