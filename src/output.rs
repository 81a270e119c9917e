//! CLI output formatting.
//!
//! Each output has a `format_*` function returning `Vec<String>` (pure, no
//! I/O, easy to test) and a `print_*` wrapper that writes to stdout.
//!
//! ## Scan
//!
//! ```text
//! Archives
//! 001 series/vol1.cbz (3+ images)
//! 002 series/vol2.cbz (3+ images)
//!
//! Unreadable
//!     broken.cbz: invalid Zip archive: Could not find EOCD
//!
//! 2 archives to convert (3 inspected)
//! ```
//!
//! ## Convert
//!
//! ```text
//! [001/002] series/vol1.cbz
//!     extract
//!     classify
//!     quality 75: 12.40 MB (budget 9.92 MB)
//!     quality 70: 9.71 MB (budget 9.92 MB)
//!     convert
//!     ...
//!     done: 24 images at quality 70, 25 entries, 15.02 MB to 10.33 MB (31.23% smaller)
//! ```
//!
//! Sizes are MiB with two decimals.

use crate::pipeline::PipelineEvent;
use crate::scan::ScanReport;
use crate::types::{ArchiveReport, ArchiveStatus, RunSummary, Warning};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Bytes as MiB with two decimals.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// `path` relative to `root` when possible.
fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::UnreadableArchive { path, reason } => {
            format!("unreadable archive {}: {}", path.display(), reason)
        }
        Warning::UnreadableImage { path, reason } => {
            let name = path.file_name().unwrap_or(path.as_os_str());
            format!("skipped image {}: {}", name.to_string_lossy(), reason)
        }
        Warning::SizeBudgetUnmet {
            quality,
            converted_bytes,
            budget_bytes,
        } => format!(
            "size budget not met: {} at quality {} (budget {})",
            format_mb(*converted_bytes),
            quality,
            format_mb(*budget_bytes)
        ),
        Warning::EntryCountMismatch { expected, actual } => format!(
            "archive holds {actual} entries, source had {expected}"
        ),
        Warning::UnsafeEntry { entry } => format!("{entry} points outside the archive, left out"),
        Warning::NameCollision {
            name,
            entry,
            renamed_to: Some(renamed),
        } => format!("{entry} collides on {name}, stored as {renamed}"),
        Warning::NameCollision {
            name,
            entry,
            renamed_to: None,
        } => format!("{entry} collides on {name}, left out"),
        Warning::ArchiveGrew {
            original_bytes,
            new_bytes,
        } => format!(
            "converted archive is {:.2}% larger than the original ({} to {})",
            percent_change(*original_bytes, *new_bytes),
            format_mb(*original_bytes),
            format_mb(*new_bytes)
        ),
        Warning::CleanupFailed { path, reason } => {
            format!("could not clean up {}: {}", path.display(), reason)
        }
        Warning::StaleScratch { path } => {
            format!("cleared leftovers of an interrupted run in {}", path.display())
        }
    }
}

/// Percentage growth from `original` to `new`; negative when smaller.
fn percent_change(original: u64, new: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (new as f64 / original as f64 - 1.0) * 100.0
}

pub fn format_scan(report: &ScanReport, source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.candidates.is_empty() {
        lines.push("Archives".to_string());
        for (i, candidate) in report.candidates.iter().enumerate() {
            lines.push(format!(
                "{} {} ({}+ images)",
                format_index(i + 1),
                relative(&candidate.path, source_root),
                candidate.matched_entries
            ));
        }
        lines.push(String::new());
    }

    if !report.warnings.is_empty() {
        lines.push("Unreadable".to_string());
        for warning in &report.warnings {
            if let Warning::UnreadableArchive { path, reason } = warning {
                lines.push(format!(
                    "{}{}: {}",
                    indent(1),
                    relative(path, source_root),
                    reason
                ));
            }
        }
        lines.push(String::new());
    }

    lines.push(format!(
        "{} to convert ({} inspected)",
        plural(report.candidates.len(), "archive", "archives"),
        report.inspected
    ));
    lines
}

pub fn print_scan(report: &ScanReport, source_root: &Path) {
    for line in format_scan(report, source_root) {
        println!("{}", line);
    }
}

fn format_archive_result(report: &ArchiveReport) -> Vec<String> {
    let mut lines = Vec::new();

    match &report.status {
        ArchiveStatus::Done => {
            let quality = report
                .final_quality
                .map(|q| format!(" at quality {q}"))
                .unwrap_or_default();
            let mut line = format!(
                "{}done: {}{}, {}",
                indent(1),
                plural(report.converted_files, "image", "images"),
                quality,
                plural(report.packed_entries, "entry", "entries")
            );
            if let Some(new_bytes) = report.new_archive_bytes {
                let change = percent_change(report.original_archive_bytes, new_bytes);
                let direction = if change > 0.0 { "larger" } else { "smaller" };
                line.push_str(&format!(
                    ", {} to {} ({:.2}% {})",
                    format_mb(report.original_archive_bytes),
                    format_mb(new_bytes),
                    change.abs(),
                    direction
                ));
            }
            lines.push(line);
        }
        ArchiveStatus::Failed { stage, reason } => {
            lines.push(format!(
                "{}FAILED at {}: {}",
                indent(1),
                stage.label(),
                reason
            ));
        }
    }

    for warning in &report.warnings {
        lines.push(format!("{}warning: {}", indent(1), format_warning(warning)));
    }
    lines
}

/// Format one pipeline progress event.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::ScanFinished {
            candidates,
            inspected,
        } => vec![format!(
            "{} to convert ({} inspected)",
            plural(*candidates, "archive", "archives"),
            inspected
        )],
        PipelineEvent::ArchiveStarted { index, total, path } => vec![format!(
            "[{}/{}] {}",
            format_index(*index),
            format_index(*total),
            path.display()
        )],
        PipelineEvent::StageReached { stage } => vec![format!("{}{}", indent(1), stage.label())],
        PipelineEvent::QualityAttempt {
            quality,
            size,
            budget,
        } => vec![format!(
            "{}quality {}: {} (budget {})",
            indent(1),
            quality,
            format_mb(*size),
            format_mb(*budget)
        )],
        PipelineEvent::ArchiveFinished(report) => format_archive_result(report),
    }
}

pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        "Summary".to_string(),
        format!("{}Candidates: {}", indent(1), summary.candidates),
        format!("{}Converted: {}", indent(1), summary.converted()),
        format!("{}Failed: {}", indent(1), summary.failed()),
        format!("{}Warnings: {}", indent(1), summary.warning_count()),
    ];

    if summary.warning_count() == 0 {
        return lines;
    }

    lines.push(String::new());
    lines.push("Warnings".to_string());
    for warning in &summary.warnings {
        lines.push(format!("{}{}", indent(1), format_warning(warning)));
    }
    for archive in summary.archives.iter().filter(|a| !a.warnings.is_empty()) {
        lines.push(format!("{}{}", indent(1), archive.source.display()));
        for warning in &archive.warnings {
            lines.push(format!("{}{}", indent(2), format_warning(warning)));
        }
    }
    lines
}

pub fn print_summary(summary: &RunSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}
