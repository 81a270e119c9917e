//! Fixed-size conversion worker pool.
//!
//! [`WorkerPool`] owns a dedicated rayon pool with exactly `workers` threads,
//! separate from the global pool. Each [`run`](WorkerPool::run) hands one job
//! set (from [`partition`](crate::partition::partition)) to each task and
//! returns only once every task has finished.
//!
//! ## Failure handling
//!
//! - A file that fails to decode, encode or write is recorded in
//!   [`PoolReport::failures`] and its worker moves on to the next file. Any
//!   output an earlier pass left for it is removed, so it is neither measured
//!   nor packed.
//! - Resource exhaustion is different: the worker raises a shared abort flag,
//!   the other workers stop before their next file, and `run` returns
//!   [`PoolError::ResourceExhausted`].
//!
//! Workers share nothing but the output directory. Output names are unique
//! within an archive (collisions are resolved during classification), so no
//! two workers ever write the same path.

use crate::imaging::{BackendError, ImageBackend, JpegParams, convert_file};
use crate::types::ConvertibleFile;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Resource exhausted while converting {path}: {source}")]
    ResourceExhausted {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file left out of the conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Outcome of one pool run, in job-set order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolReport {
    /// Output paths written by this run.
    pub written: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("convert-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Convert every file in `jobs` into `output_dir` at `params`.
    ///
    /// Empty job sets are skipped. Blocks until all workers are done.
    pub fn run(
        &self,
        backend: &impl ImageBackend,
        jobs: &[Vec<ConvertibleFile>],
        output_dir: &Path,
        params: &JpegParams,
    ) -> Result<PoolReport, PoolError> {
        let abort = AtomicBool::new(false);

        let results: Vec<Result<PoolReport, PoolError>> = self.pool.install(|| {
            jobs.par_iter()
                .filter(|set| !set.is_empty())
                .map(|set| run_worker(backend, set, output_dir, params, &abort))
                .collect()
        });

        let mut report = PoolReport::default();
        for result in results {
            let worker = result?;
            report.written.extend(worker.written);
            report.failures.extend(worker.failures);
        }
        debug!(
            quality = params.quality.value(),
            written = report.written.len(),
            failed = report.failures.len(),
            "pool run finished"
        );
        Ok(report)
    }
}

fn run_worker(
    backend: &impl ImageBackend,
    set: &[ConvertibleFile],
    output_dir: &Path,
    params: &JpegParams,
    abort: &AtomicBool,
) -> Result<PoolReport, PoolError> {
    let mut report = PoolReport::default();

    for job in set {
        if abort.load(Ordering::Relaxed) {
            break;
        }
        let output = output_dir.join(&job.output_name);
        match convert_file(backend, &job.source_path, &output, params) {
            Ok(_) => report.written.push(output),
            Err(e) if e.is_fatal() => {
                abort.store(true, Ordering::Relaxed);
                return Err(PoolError::ResourceExhausted {
                    path: job.source_path.clone(),
                    source: e,
                });
            }
            Err(e) => {
                warn!(file = %job.source_path.display(), error = %e, "conversion failed");
                discard(&output)?;
                report.failures.push(FileFailure {
                    source: job.source_path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn discard(output: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(output) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
