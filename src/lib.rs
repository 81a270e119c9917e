//! # cbz-recode
//!
//! Bulk re-encoding of the images inside comic-book archives. Every `.cbz` /
//! `.zip` under a source tree holding enough WebP, PNG, BMP or TIFF pages is
//! rebuilt as a flat archive of JPEGs, re-encoded at lower quality until the
//! converted pages fit a size budget relative to the originals.
//!
//! # Pipeline
//!
//! ```text
//! scan (once)                   source tree → candidate archives
//! for each candidate, in order:
//!   extract                     archive → scratch/extracted
//!   classify                    images stay, other files → scratch/passthrough
//!   convert (+fallback)         N workers → scratch/converted/*.jpg
//!   merge, pack, verify         scratch/converted → destination/<same path>
//!   clean up                    scratch emptied
//! ```
//!
//! Archives are processed strictly one after another, so scratch space never
//! holds more than one extracted archive. Parallelism lives inside the
//! conversion step: the images of one archive are striped across a fixed pool
//! of workers.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, stock defaults, merging, validation |
//! | [`formats`] | Extension predicates: which entries are images, which files are archives |
//! | [`scan`] | Walks the source tree and selects archives by image count |
//! | [`partition`] | Round-robin split of an archive's images into per-worker sets |
//! | [`pool`] | Fixed-size worker pool running one conversion pass |
//! | [`fallback`] | Quality loop: re-run the pool lower until the size budget is met |
//! | [`staging`] | Scratch directories: extract, classify, clean up |
//! | [`rebuild`] | Merge passthrough files, pack the new archive, verify entry count |
//! | [`pipeline`] | Orchestrates everything above for a whole run |
//! | [`archive`] | Zip codec behind the [`archive::ArchiveBackend`] trait |
//! | [`imaging`] | Image codec behind the [`imaging::ImageBackend`] trait |
//! | [`types`] | Shared data: candidates, files, warnings, per-archive reports |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Flat Output Archives
//!
//! Rebuilt archives have no internal folders: every file is stored under its
//! base name. Comic readers sort pages by name and ignore folders anyway.
//! Two entries that flatten to the same name are detected while classifying;
//! the later one is left out (or renamed, with
//! `naming.disambiguate_collisions`), never silently overwritten.
//!
//! ## Warnings Are Data
//!
//! Only two things stop a run: bad startup paths or config, and running out
//! of memory while decoding. Everything else, from an unreadable archive to
//! an unmet size budget, is a [`types::Warning`] attached to the run summary.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding uses the `image` crate and encoding uses `jpeg-encoder`; the
//! binary has no system library dependencies.

pub mod archive;
pub mod config;
pub mod fallback;
pub mod formats;
pub mod imaging;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod pool;
pub mod rebuild;
pub mod scan;
pub mod staging;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
