//! Converter configuration.
//!
//! One immutable [`Config`] value is built at startup and passed by reference
//! into every stage. Nothing reads configuration from ambient state.
//!
//! ## Config File
//!
//! Pass `--config path/to/config.toml`. Without it the stock defaults apply.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [formats]
//! convertible = ["webp", "png", "bmp", "dib", "tif", "tiff"]
//! archives = ["zip", "cbz"]
//!
//! [scan]
//! threshold = 1             # Minimum convertible entries to select an archive
//!
//! [jpeg]
//! quality = 75              # Starting JPEG quality (floor..=100)
//! optimize = true           # Optimized Huffman tables (extra pass, smaller file)
//! progressive = false       # Progressive scans
//!
//! [fallback]
//! enabled = true            # Re-encode at lower quality until the ratio is met
//! ratio = 0.8               # Max converted/original size ratio
//! step = 5                  # Quality decrement per retry
//! floor = 1                 # Lowest quality the fallback loop may try
//!
//! [archive]
//! compression = "stored"    # "stored" or "deflated"
//!
//! [naming]
//! disambiguate_collisions = false
//!
//! [processing]
//! workers = 4               # Fixed number of conversion workers
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. User values
//! are merged on top of the stock defaults with [`merge_toml`], then the
//! result is validated. Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full converter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub formats: FormatsConfig,
    pub scan: ScanConfig,
    pub jpeg: JpegConfig,
    pub fallback: FallbackConfig,
    pub archive: ArchiveConfig,
    pub naming: NamingConfig,
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formats.convertible.is_empty() {
            return Err(ConfigError::Validation(
                "formats.convertible must not be empty".into(),
            ));
        }
        if self.formats.archives.is_empty() {
            return Err(ConfigError::Validation(
                "formats.archives must not be empty".into(),
            ));
        }
        if self.fallback.floor == 0 {
            return Err(ConfigError::Validation("fallback.floor must be >= 1".into()));
        }
        if self.fallback.step == 0 {
            return Err(ConfigError::Validation("fallback.step must be >= 1".into()));
        }
        if !(self.fallback.ratio > 0.0 && self.fallback.ratio.is_finite()) {
            return Err(ConfigError::Validation(
                "fallback.ratio must be a positive number".into(),
            ));
        }
        if self.jpeg.quality > 100 || self.jpeg.quality < self.fallback.floor {
            return Err(ConfigError::Validation(format!(
                "jpeg.quality must be {}-100",
                self.fallback.floor
            )));
        }
        if self.processing.workers == 0 {
            return Err(ConfigError::Validation(
                "processing.workers must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Extension allow-lists. Matched case-insensitively, without the dot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    /// Raster formats that get re-encoded as JPEG.
    pub convertible: BTreeSet<String>,
    /// Container extensions the scanner opens.
    pub archives: BTreeSet<String>,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        let set = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            convertible: set(&["webp", "png", "bmp", "dib", "tif", "tiff"]),
            archives: set(&["zip", "cbz"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Minimum number of convertible entries for an archive to be selected.
    pub threshold: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { threshold: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegConfig {
    pub quality: u8,
    pub optimize: bool,
    pub progressive: bool,
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self {
            quality: 75,
            optimize: true,
            progressive: false,
        }
    }
}

/// Settings for the quality fallback loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Target ceiling for `converted_bytes / original_bytes`.
    pub ratio: f64,
    pub step: u8,
    pub floor: u8,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio: 0.8,
            step: 5,
            floor: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression; JPEG payloads barely shrink under deflate anyway.
    #[default]
    Stored,
    Deflated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    pub compression: Compression,
}

/// What to do when two entries flatten to the same file name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    /// Rename later duplicates to `<n>-<name>` instead of dropping them.
    pub disambiguate_collisions: bool,
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Fixed number of conversion workers. Not clamped to the core count.
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let mut config: Config = merged.try_into()?;
    config.formats.convertible = normalize_extensions(&config.formats.convertible);
    config.formats.archives = normalize_extensions(&config.formats.archives);
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Lowercase and strip a leading dot so `".PNG"` and `"png"` mean the same.
fn normalize_extensions(exts: &BTreeSet<String>) -> BTreeSet<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# cbz-recode configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

[formats]
# Entry extensions that are decoded and re-encoded as JPEG.
convertible = ["bmp", "dib", "png", "tif", "tiff", "webp"]
# File extensions treated as zip archives while scanning the source tree.
archives = ["cbz", "zip"]

[scan]
# Minimum number of convertible entries an archive needs to be converted.
threshold = 1

[jpeg]
# Starting JPEG quality, between fallback.floor and 100.
quality = 75
# Optimized Huffman tables: an extra pass for a slightly smaller file.
optimize = true
# Progressive scans. Sometimes a little smaller, slower to encode.
progressive = false

[fallback]
# When the converted images are larger than `ratio` times the originals,
# convert everything again at `quality - step`, repeatedly, until the ratio
# is met or the next step would go below `floor`.
enabled = true
ratio = 0.8
step = 5
floor = 1

[archive]
# Compression for the rebuilt archive: "stored" or "deflated".
compression = "stored"

[naming]
# Archives are rebuilt flat, so `a/01.png` and `b/01.png` collide.
# false: keep the first, leave the rest out and warn.
# true:  rename later ones to `1-01.jpg`, `2-01.jpg`, ... (changes names).
disambiguate_collisions = false

[processing]
# Number of parallel conversion workers.
workers = 4
"##
}
