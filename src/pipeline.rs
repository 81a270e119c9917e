//! The conversion pipeline.
//!
//! Scans the source tree once, then processes the selected archives one at a
//! time:
//!
//! ```text
//! extract ─▶ classify ─▶ convert (+fallback) ─▶ merge ─▶ pack ─▶ verify ─▶ clean up
//! ```
//!
//! Only one archive is ever staged, so scratch usage is bounded by the
//! largest archive rather than the whole library. The target archive keeps
//! the source's path relative to the source root, under the destination.
//!
//! ## Failures
//!
//! | Failure | Effect |
//! |---|---|
//! | archive cannot be opened during scan | warning, archive skipped |
//! | one image cannot be decoded or encoded | warning, image left out |
//! | extraction, filesystem or packing error | archive marked failed, run goes on |
//! | resource exhaustion | run aborts with [`PipelineError::ResourceExhausted`] |
//!
//! Scratch directories are emptied after every archive, failed or not.
//!
//! Progress is reported as [`PipelineEvent`]s on an optional channel; the CLI
//! prints them from a separate thread.

use crate::archive::{ArchiveBackend, ArchiveError, ZipBackend};
use crate::config::Config;
use crate::fallback::convert_with_budget;
use crate::formats::FormatFilter;
use crate::imaging::{ImageBackend, JpegParams, RustBackend};
use crate::partition::partition;
use crate::pool::{PoolError, WorkerPool};
use crate::rebuild::{RebuildError, rebuild};
use crate::scan::{ScanError, scan};
use crate::staging::StagingArea;
use crate::types::{ArchiveReport, ArchiveStatus, RunSummary, Stage, Warning};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{path}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Resource exhausted converting {file} from {archive}: {reason}")]
    ResourceExhausted {
        archive: PathBuf,
        file: PathBuf,
        reason: String,
    },
}

/// Why a single archive failed. The run continues with the next archive.
#[derive(Error, Debug)]
pub enum ArchiveFailure {
    #[error("Extraction failed: {0}")]
    Extraction(#[source] ArchiveError),
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] io::Error),
    #[error("Rebuild failed: {0}")]
    Packing(#[source] RebuildError),
}

/// The three directories a run works with.
#[derive(Debug, Clone)]
pub struct Paths {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub scratch: PathBuf,
}

impl Paths {
    /// Source and destination must exist. The scratch directory is created.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.source.is_dir() {
            return Err(PipelineError::InvalidPath {
                path: self.source.clone(),
                reason: "source directory does not exist",
            });
        }
        if !self.destination.is_dir() {
            return Err(PipelineError::InvalidPath {
                path: self.destination.clone(),
                reason: "destination directory does not exist",
            });
        }
        fs::create_dir_all(&self.scratch).map_err(|source| PipelineError::Scratch {
            path: self.scratch.clone(),
            source,
        })
    }

    /// Where the converted copy of `archive` goes.
    pub fn target_for(&self, archive: &Path) -> PathBuf {
        match archive.strip_prefix(&self.source) {
            Ok(relative) => self.destination.join(relative),
            Err(_) => self
                .destination
                .join(archive.file_name().unwrap_or(archive.as_os_str())),
        }
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    ScanFinished {
        candidates: usize,
        inspected: usize,
    },
    ArchiveStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    StageReached {
        stage: Stage,
    },
    QualityAttempt {
        quality: u8,
        size: u64,
        budget: u64,
    },
    ArchiveFinished(ArchiveReport),
}

/// Run the pipeline with the zip and pure-Rust image backends.
pub fn run(
    paths: &Paths,
    config: &Config,
    events: Option<Sender<PipelineEvent>>,
) -> Result<RunSummary, PipelineError> {
    let archive_backend = ZipBackend::new(config.archive.compression);
    let image_backend = RustBackend::new();
    run_with_backends(&archive_backend, &image_backend, paths, config, events)
}

/// Run the pipeline with specific backends (allows testing with mocks).
pub fn run_with_backends(
    archive_backend: &impl ArchiveBackend,
    image_backend: &impl ImageBackend,
    paths: &Paths,
    config: &Config,
    events: Option<Sender<PipelineEvent>>,
) -> Result<RunSummary, PipelineError> {
    paths.validate()?;

    let filter = FormatFilter::new(&config.formats);
    let scanned = scan(&paths.source, &filter, config.scan.threshold, archive_backend)?;
    let mut summary = RunSummary {
        candidates: scanned.candidates.len(),
        warnings: scanned.warnings,
        archives: Vec::new(),
    };
    emit(
        &events,
        PipelineEvent::ScanFinished {
            candidates: scanned.candidates.len(),
            inspected: scanned.inspected,
        },
    );

    let staging = StagingArea::new(&paths.scratch);
    if scanned.candidates.is_empty() {
        summary.warnings.extend(staging.remove());
        return Ok(summary);
    }
    let stale = staging
        .prepare()
        .map_err(|source| PipelineError::Scratch {
            path: paths.scratch.clone(),
            source,
        })?;
    if stale {
        warn!(path = %paths.scratch.display(), "cleared scratch left by an earlier run");
        summary.warnings.push(Warning::StaleScratch {
            path: paths.scratch.clone(),
        });
    }

    let ctx = Context {
        archive_backend,
        image_backend,
        config,
        filter,
        staging,
        pool: WorkerPool::new(config.processing.workers)?,
        events: &events,
    };

    let total = scanned.candidates.len();
    for (index, candidate) in scanned.candidates.iter().enumerate() {
        emit(
            &events,
            PipelineEvent::ArchiveStarted {
                index: index + 1,
                total,
                path: candidate.path.clone(),
            },
        );
        let target = paths.target_for(&candidate.path);
        let mut state = ArchiveProcessingState::new(&candidate.path, target);

        let result = ctx.process(&mut state);
        state.report.warnings.extend(ctx.staging.cleanup());

        match result {
            Ok(()) => {}
            Err(Abort::Failed(failure)) => {
                warn!(
                    archive = %candidate.path.display(),
                    stage = state.stage.label(),
                    error = %failure,
                    "archive failed"
                );
                state.report.status = ArchiveStatus::Failed {
                    stage: state.stage,
                    reason: failure.to_string(),
                };
            }
            Err(Abort::Fatal(e)) => {
                for warning in ctx.staging.remove() {
                    warn!(?warning, "scratch cleanup after abort");
                }
                return Err(e);
            }
        }
        ctx.reached(state.source, Stage::CleanedUp);

        emit(&events, PipelineEvent::ArchiveFinished(state.report.clone()));
        summary.archives.push(state.report);
    }

    summary.warnings.extend(ctx.staging.remove());
    Ok(summary)
}

fn emit(events: &Option<Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is printing
        let _ = tx.send(event);
    }
}

enum Abort {
    Failed(ArchiveFailure),
    Fatal(PipelineError),
}

impl From<ArchiveFailure> for Abort {
    fn from(failure: ArchiveFailure) -> Self {
        Abort::Failed(failure)
    }
}

impl From<io::Error> for Abort {
    fn from(e: io::Error) -> Self {
        Abort::Failed(ArchiveFailure::Filesystem(e))
    }
}

/// Everything known about the archive in progress. Dropped when it is done.
struct ArchiveProcessingState<'a> {
    source: &'a Path,
    target: PathBuf,
    /// Stage being worked on; the failed stage if processing stops.
    stage: Stage,
    report: ArchiveReport,
}

impl<'a> ArchiveProcessingState<'a> {
    fn new(source: &'a Path, target: PathBuf) -> Self {
        Self {
            source,
            report: ArchiveReport::new(source.to_path_buf(), target.clone()),
            target,
            stage: Stage::Extracted,
        }
    }
}

struct Context<'a, A, I> {
    archive_backend: &'a A,
    image_backend: &'a I,
    config: &'a Config,
    filter: FormatFilter,
    staging: StagingArea,
    pool: WorkerPool,
    events: &'a Option<Sender<PipelineEvent>>,
}

impl<A: ArchiveBackend, I: ImageBackend> Context<'_, A, I> {
    fn reached(&self, archive: &Path, stage: Stage) {
        debug!(archive = %archive.display(), stage = stage.label(), "stage reached");
        emit(self.events, PipelineEvent::StageReached { stage });
    }

    fn process(&self, state: &mut ArchiveProcessingState) -> Result<(), Abort> {
        let report = &mut state.report;

        state.stage = Stage::Extracted;
        report.original_archive_bytes = fs::metadata(state.source)?.len();
        let extraction = self
            .staging
            .extract(self.archive_backend, state.source)
            .map_err(ArchiveFailure::Extraction)?;
        let skipped = extraction.unsafe_entries.len();
        report.warnings.extend(
            extraction
                .unsafe_entries
                .into_iter()
                .map(|entry| Warning::UnsafeEntry { entry }),
        );
        self.reached(state.source, Stage::Extracted);

        state.stage = Stage::Classified;
        let classified = self.staging.classify(&self.filter, &self.config.naming)?;
        // Unsafe entries still count toward the source file total
        report.original_files = classified.original_files + skipped;
        report.original_image_bytes = classified.original_size;
        report.warnings.extend(classified.warnings);
        self.reached(state.source, Stage::Classified);

        state.stage = Stage::Converted;
        let jobs = partition(classified.convertible, self.pool.workers());
        let outcome = convert_with_budget(
            &self.pool,
            self.image_backend,
            &jobs,
            &self.staging.converted,
            classified.original_size,
            JpegParams::from(&self.config.jpeg),
            &self.config.fallback,
        )
        .map_err(|e| match e {
            PoolError::ResourceExhausted { path, source } => {
                Abort::Fatal(PipelineError::ResourceExhausted {
                    archive: state.source.to_path_buf(),
                    file: path,
                    reason: source.to_string(),
                })
            }
            PoolError::Io(e) => Abort::Failed(ArchiveFailure::Filesystem(e)),
        })?;
        for attempt in &outcome.attempts {
            emit(
                self.events,
                PipelineEvent::QualityAttempt {
                    quality: attempt.quality,
                    size: attempt.size,
                    budget: outcome.budget_bytes,
                },
            );
        }
        report.converted_files = outcome.written.len();
        report.final_quality = Some(outcome.final_quality);
        report.quality_attempts = outcome.attempts.iter().map(|a| (a.quality, a.size)).collect();
        report.converted_image_bytes = outcome.final_size;
        report
            .warnings
            .extend(outcome.failures.into_iter().map(|f| Warning::UnreadableImage {
                path: f.source,
                reason: f.reason,
            }));
        if self.config.fallback.enabled && !outcome.budget_met {
            warn!(
                archive = %state.source.display(),
                quality = outcome.final_quality,
                size = outcome.final_size,
                budget = outcome.budget_bytes,
                "size budget not met at the quality floor"
            );
            report.warnings.push(Warning::SizeBudgetUnmet {
                quality: outcome.final_quality,
                converted_bytes: outcome.final_size,
                budget_bytes: outcome.budget_bytes,
            });
        }
        self.reached(state.source, Stage::Converted);

        state.stage = Stage::Merged;
        let rebuilt = match rebuild(
            self.archive_backend,
            &self.staging.converted,
            &classified.passthrough,
            &state.target,
            report.original_files,
        ) {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                state.stage = e.stage();
                if e.stage() == Stage::Packed {
                    remove_partial(&state.target);
                }
                return Err(ArchiveFailure::Packing(e).into());
            }
        };
        self.reached(state.source, Stage::Merged);
        self.reached(state.source, Stage::Packed);

        state.stage = Stage::Verified;
        report.packed_entries = rebuilt.packed;
        report.warnings.extend(rebuilt.mismatch);
        let new_bytes = fs::metadata(&state.target)?.len();
        report.new_archive_bytes = Some(new_bytes);
        if new_bytes > report.original_archive_bytes {
            warn!(
                archive = %state.source.display(),
                original = report.original_archive_bytes,
                new = new_bytes,
                "converted archive is larger than the source"
            );
            report.warnings.push(Warning::ArchiveGrew {
                original_bytes: report.original_archive_bytes,
                new_bytes,
            });
        }
        self.reached(state.source, Stage::Verified);

        Ok(())
    }
}

fn remove_partial(target: &Path) {
    match fs::remove_file(target) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            warn!(path = %target.display(), error = %e, "cannot remove partial archive");
        }
        _ => {}
    }
}
