//! Parameter types for JPEG encoding.
//!
//! - [`Quality`]: JPEG quality (1-100). Clamped on construction.
//! - [`JpegParams`]: quality plus the optimize/progressive switches, fixed
//!   for one pool run.

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Encoder settings for one conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegParams {
    pub quality: Quality,
    pub optimize: bool,
    pub progressive: bool,
}

impl JpegParams {
    /// Same switches, different quality. Used by the fallback loop.
    pub fn with_quality(self, quality: Quality) -> Self {
        Self { quality, ..self }
    }
}

impl From<&crate::config::JpegConfig> for JpegParams {
    fn from(config: &crate::config::JpegConfig) -> Self {
        Self {
            quality: Quality::new(config.quality),
            optimize: config.optimize,
            progressive: config.progressive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JpegConfig;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn params_from_config() {
        let params = JpegParams::from(&JpegConfig {
            quality: 60,
            optimize: false,
            progressive: true,
        });
        assert_eq!(params.quality.value(), 60);
        assert!(!params.optimize);
        assert!(params.progressive);
    }

    #[test]
    fn with_quality_keeps_switches() {
        let params = JpegParams::from(&JpegConfig::default()).with_quality(Quality::new(40));
        assert_eq!(params.quality.value(), 40);
        assert!(params.optimize);
        assert!(!params.progressive);
    }
}
