//! Quality fallback loop.
//!
//! Converts an archive's images at the configured quality, then checks the
//! total JPEG size against `ratio × original_size`. While over budget, the
//! whole set is converted again `step` lower, overwriting the previous
//! outputs, until the budget is met or the next step would go below `floor`.
//!
//! ```text
//! 75 ──▶ 750 B > 560 ──▶ 70 ──▶ 700 B > 560 ──▶ … ──▶ 55 ──▶ 550 B ≤ 560 ✓
//! ```
//!
//! Quality only ever goes down, so the loop runs at most
//! `1 + (start - floor) / step` times.

use crate::config::FallbackConfig;
use crate::imaging::{ImageBackend, JpegParams, Quality};
use crate::pool::{FileFailure, PoolError, WorkerPool};
use crate::types::ConvertibleFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One full conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub quality: u8,
    /// Total JPEG bytes in the output directory after the pass.
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    pub final_quality: u8,
    pub final_size: u64,
    /// Every pass, in order. Qualities strictly decrease.
    pub attempts: Vec<Attempt>,
    pub budget_met: bool,
    pub budget_bytes: u64,
    /// Files written by the last pass.
    pub written: Vec<PathBuf>,
    /// Files that failed in the last pass.
    pub failures: Vec<FileFailure>,
}

/// `converted <= ratio × original`. An empty original is always met.
pub fn within_budget(converted: u64, original: u64, ratio: f64) -> bool {
    original == 0 || converted as f64 <= ratio * original as f64
}

/// Total size of `*.jpg` files directly under `dir`.
pub fn measure_jpeg_bytes(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_jpg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg"));
        if is_jpg && entry.file_type()?.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

pub fn convert_with_budget(
    pool: &WorkerPool,
    backend: &impl ImageBackend,
    jobs: &[Vec<ConvertibleFile>],
    output_dir: &Path,
    original_size: u64,
    jpeg: JpegParams,
    fallback: &FallbackConfig,
) -> Result<FallbackOutcome, PoolError> {
    let budget_bytes = (fallback.ratio * original_size as f64) as u64;
    let mut params = jpeg;
    let mut attempts = Vec::new();

    loop {
        let report = pool.run(backend, jobs, output_dir, &params)?;
        let size = measure_jpeg_bytes(output_dir)?;
        let quality = params.quality.value();
        attempts.push(Attempt { quality, size });

        let budget_met = within_budget(size, original_size, fallback.ratio);
        debug!(quality, size, budget_bytes, budget_met, "conversion pass");

        let next = match next_quality(quality, fallback) {
            Some(next) if fallback.enabled && !budget_met => next,
            _ => {
                return Ok(FallbackOutcome {
                    final_quality: quality,
                    final_size: size,
                    attempts,
                    budget_met,
                    budget_bytes,
                    written: report.written,
                    failures: report.failures,
                });
            }
        };
        params = params.with_quality(Quality::new(next));
    }
}

/// `quality - step`, unless that falls below the floor.
fn next_quality(quality: u8, fallback: &FallbackConfig) -> Option<u8> {
    quality
        .checked_sub(fallback.step)
        .filter(|&q| q >= fallback.floor && fallback.step > 0)
}
