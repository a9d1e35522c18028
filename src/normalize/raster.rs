//! Pure Rust normalizer built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Sniff + decode (JPEG, PNG, WebP) | `image::ImageReader::with_guessed_format` |
//! | Square crop | `image::DynamicImage::resize_to_fill` with `Lanczos3` |
//! | Fit resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality-controlled) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |

use super::calculations::{calculate_fit_dimensions, calculate_square_side};
use super::params::NormalizeConfig;
use super::{NormalizeError, Normalizer};
use crate::config::OutputFormat;
use crate::payload::ImagePayload;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Mime type of `bytes` if they look like an image format this crate can read.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .filter(|format| format.reading_enabled())
        .map(|format| format.to_mime_type())
}

/// Decode with format sniffing.
fn load_image(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    match reader.format() {
        Some(format) if format.reading_enabled() => {}
        _ => return Err(NormalizeError::UnknownFormat),
    }
    reader
        .decode()
        .map_err(|e| NormalizeError::Decode(e.to_string()))
}

fn encode_image(img: &DynamicImage, config: &NormalizeConfig) -> Result<Vec<u8>, NormalizeError> {
    let mut out = Vec::new();
    let result = match config.format {
        OutputFormat::Jpeg => {
            // The JPEG encoder has no alpha channel.
            let encoder = JpegEncoder::new_with_quality(&mut out, config.quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut out)),
        OutputFormat::Webp => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut out)),
    };
    result.map_err(|e| NormalizeError::Encode(format!("{:?}: {e}", config.format)))?;
    Ok(out)
}

/// [`Normalizer`] for raster uploads.
///
/// See the [module docs](self) for the crate-to-step mapping.
#[derive(Debug, Clone, Default)]
pub struct RasterNormalizer {
    config: NormalizeConfig,
}

impl RasterNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    fn shape(&self, img: DynamicImage) -> DynamicImage {
        let source = (img.width(), img.height());
        let target = self.config.target_size;
        if self.config.force_square {
            let side = calculate_square_side(source, target);
            if source == (side, side) {
                return img;
            }
            // Fill-resize then center-crop to exact dimensions
            return img.resize_to_fill(side, side, FilterType::Lanczos3);
        }
        let (width, height) = calculate_fit_dimensions(source, target);
        if (width, height) == source {
            return img;
        }
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

impl Normalizer for RasterNormalizer {
    fn normalize(&self, bytes: &[u8]) -> Result<ImagePayload, NormalizeError> {
        let img = load_image(bytes)?;
        let source = (img.width(), img.height());
        let shaped = self.shape(img);
        debug!(
            from = ?source,
            to = ?(shaped.width(), shaped.height()),
            format = ?self.config.format,
            "normalized"
        );
        let encoded = encode_image(&shaped, &self.config)?;
        Ok(ImagePayload::from_mime_type(
            self.config.format.mime_type(),
            encoded,
        ))
    }
}
