//! Pipeline configuration.
//!
//! Loaded from an optional TOML file. Every field has a default, so a
//! config file only needs the values it wants to change:
//!
//! ```toml
//! [codecs]
//! min_savings = 0.10
//! ```
//!
//! Unknown keys are rejected to catch typos early. Run
//! `avatar-codec gen-config` for a fully documented file.

use crate::codec::Transport;
use serde::{Deserialize, Serialize};
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

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Which codecs compete and how the winner is chosen.
    pub codecs: CodecsConfig,
    /// Batch optimizer settings.
    pub batch: BatchConfig,
    /// Normalizer settings.
    pub normalize: NormalizeSettings,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let savings = self.codecs.min_savings;
        if !(0.0..1.0).contains(&savings) {
            return Err(ConfigError::Validation(
                "codecs.min_savings must be in 0.0..1.0".into(),
            ));
        }
        for (i, kind) in self.codecs.enabled.iter().enumerate() {
            if self.codecs.enabled[..i].contains(kind) {
                return Err(ConfigError::Validation(format!(
                    "codecs.enabled lists {kind:?} more than once"
                )));
            }
        }
        if self.batch.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch.batch_size must be at least 1".into(),
            ));
        }
        if self.normalize.target_size == 0 {
            return Err(ConfigError::Validation(
                "normalize.target_size must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.normalize.quality) {
            return Err(ConfigError::Validation(
                "normalize.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

/// A codec that can be enabled in `[codecs]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    Base85,
    Dictionary,
    WebpMark,
}

/// Codec selection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CodecsConfig {
    /// Codecs that compete for each image, in registration order.
    pub enabled: Vec<CodecKind>,
    /// Minimum fractional saving over the raw payload before a compressed
    /// candidate is stored.
    pub min_savings: f64,
    /// Text form of the dictionary codec's bitstream.
    pub transport: Transport,
    /// Decode every candidate and compare against the source before accepting it.
    pub verify: bool,
}

impl Default for CodecsConfig {
    fn default() -> Self {
        Self {
            enabled: vec![CodecKind::Dictionary, CodecKind::Base85, CodecKind::WebpMark],
            min_savings: 0.05,
            transport: Transport::UriSafe,
            verify: true,
        }
    }
}

/// Batch optimizer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Images encoded concurrently before waiting for the batch to settle.
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 5 }
    }
}

/// Output raster format of the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

/// Normalizer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeSettings {
    /// Longest edge in pixels (or side length when `force_square`).
    pub target_size: u32,
    /// JPEG quality (1-100). Ignored by lossless formats.
    pub quality: u32,
    /// Center-crop to a square.
    pub force_square: bool,
    pub format: OutputFormat,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            target_size: 256,
            quality: 85,
            force_square: true,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// A documented config file with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r#"# avatar-codec configuration
# All options are optional; the values below are the defaults.

[codecs]
# Codecs that compete for each image. RAW is always the fallback.
#   dictionary  adaptive LZ compression of the base64 text ("LZDICT:")
#   base85      4-bytes-to-5-symbols packing of the image bytes ("B85:")
#   webp_mark   tag WebP images as already optimal ("WEBP:")
enabled = ["dictionary", "base85", "webp_mark"]

# A compressed candidate must be at least this much smaller than the raw
# base64 payload (0.05 = 5%), otherwise the image is stored untransformed.
min_savings = 0.05

# Text form of the dictionary bitstream: "uri_safe", "base64" or "utf16".
transport = "uri_safe"

# Decode every candidate and compare it with the source before accepting it.
verify = true

[batch]
# Images encoded together before waiting for the batch to finish.
batch_size = 5

[normalize]
# Longest edge in pixels, or the side length when force_square is set.
target_size = 256
# JPEG quality (1-100).
quality = 85
# Center-crop every image to a square.
force_square = true
# Output format: "jpeg", "png" or "webp" (lossless).
format = "jpeg"
"#
}
