//! Shared types passed between pipeline stages and into the run summary.
//!
//! Everything that ends up in the summary derives `Serialize` so
//! `convert --report` can write it out as JSON unchanged.

use serde::Serialize;
use std::path::PathBuf;

/// An archive selected for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveCandidate {
    pub path: PathBuf,
    /// Convertible entries counted before the scanner stopped looking.
    /// At least the threshold, not necessarily the exact total.
    pub matched_entries: usize,
}

/// An extracted image that will be re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertibleFile {
    pub source_path: PathBuf,
    pub original_size: u64,
    /// File name of the JPEG in the flat output directory.
    pub output_name: String,
}

/// An extracted file copied through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughFile {
    /// Where the file sits now, already under its flattened name.
    pub current_path: PathBuf,
    /// Path of the entry inside the source archive.
    pub original_entry_name: String,
}

/// Per-archive lifecycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extracted,
    Classified,
    Converted,
    Merged,
    Packed,
    Verified,
    CleanedUp,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Extracted => "extract",
            Stage::Classified => "classify",
            Stage::Converted => "convert",
            Stage::Merged => "merge",
            Stage::Packed => "pack",
            Stage::Verified => "verify",
            Stage::CleanedUp => "clean up",
        }
    }
}

/// A non-fatal condition, surfaced in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An archive could not be opened during the scan.
    UnreadableArchive { path: PathBuf, reason: String },
    /// One image failed to decode or encode and was left out.
    UnreadableImage { path: PathBuf, reason: String },
    /// The fallback loop hit the quality floor while still over budget.
    SizeBudgetUnmet {
        quality: u8,
        converted_bytes: u64,
        budget_bytes: u64,
    },
    /// The rebuilt archive holds a different number of files than the source.
    EntryCountMismatch { expected: usize, actual: usize },
    /// An entry whose name would escape the extraction directory was left out.
    UnsafeEntry { entry: String },
    /// Two entries flattened to the same name.
    NameCollision {
        name: String,
        entry: String,
        /// `Some` when the entry was renamed, `None` when it was left out.
        renamed_to: Option<String>,
    },
    /// The rebuilt archive is not smaller than the source archive.
    ArchiveGrew { original_bytes: u64, new_bytes: u64 },
    /// Scratch files could not be removed.
    CleanupFailed { path: PathBuf, reason: String },
    /// Scratch state from an earlier, interrupted run was found and cleared.
    StaleScratch { path: PathBuf },
}

/// How one archive ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveStatus {
    Done,
    Failed { stage: Stage, reason: String },
}

/// Everything reported about one archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveReport {
    pub source: PathBuf,
    pub target: PathBuf,
    pub status: ArchiveStatus,
    /// Files extracted from the source archive.
    pub original_files: usize,
    pub converted_files: usize,
    pub packed_entries: usize,
    /// Last quality tried, if conversion ran.
    pub final_quality: Option<u8>,
    /// Every quality tried, with the total JPEG bytes it produced.
    pub quality_attempts: Vec<(u8, u64)>,
    pub original_image_bytes: u64,
    pub converted_image_bytes: u64,
    pub original_archive_bytes: u64,
    pub new_archive_bytes: Option<u64>,
    pub warnings: Vec<Warning>,
}

impl ArchiveReport {
    pub fn new(source: PathBuf, target: PathBuf) -> Self {
        Self {
            source,
            target,
            status: ArchiveStatus::Done,
            original_files: 0,
            converted_files: 0,
            packed_entries: 0,
            final_quality: None,
            quality_attempts: Vec::new(),
            original_image_bytes: 0,
            converted_image_bytes: 0,
            original_archive_bytes: 0,
            new_archive_bytes: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == ArchiveStatus::Done
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub candidates: usize,
    /// Warnings not tied to one converted archive (scan, scratch handling).
    pub warnings: Vec<Warning>,
    pub archives: Vec<ArchiveReport>,
}

impl RunSummary {
    pub fn converted(&self) -> usize {
        self.archives.iter().filter(|a| a.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.archives.len() - self.converted()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
            + self
                .archives
                .iter()
                .map(|a| a.warnings.len())
                .sum::<usize>()
    }
}
