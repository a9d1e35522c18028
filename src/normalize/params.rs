//! Parameter types for normalization.
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`NormalizeConfig`]: target size, quality, square cropping and output format.

use crate::config::{NormalizeSettings, OutputFormat};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }
}

/// How the normalizer shapes and encodes every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Longest edge, or the square's side when `force_square` is set.
    pub target_size: u32,
    pub quality: Quality,
    pub force_square: bool,
    pub format: OutputFormat,
}

impl NormalizeConfig {
    pub fn from_settings(settings: &NormalizeSettings) -> Self {
        Self {
            target_size: settings.target_size,
            quality: Quality::new(settings.quality),
            force_square: settings.force_square,
            format: settings.format,
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self::from_settings(&NormalizeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn default_config_matches_settings() {
        let config = NormalizeConfig::default();
        assert_eq!(config.target_size, 256);
        assert_eq!(config.quality, Quality::new(85));
        assert!(config.force_square);
        assert_eq!(config.format, OutputFormat::Jpeg);
    }

    #[test]
    fn output_format_mime_types() {
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Webp.mime_type(), "image/webp");
    }
}
