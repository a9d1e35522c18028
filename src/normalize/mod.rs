//! Image normalization: raw upload bytes in, [`ImagePayload`] out.
//!
//! Every upload is decoded, cropped or fitted to one target size, and
//! re-encoded in a single output format, so the codecs downstream always
//! see small images of a predictable type.
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: [`NormalizeConfig`] and [`Quality`]
//! - **Raster**: [`Normalizer`] trait implementation on the `image` crate

mod calculations;
mod params;
pub mod raster;

pub use calculations::{calculate_fit_dimensions, calculate_square_side};
pub use params::{NormalizeConfig, Quality};
pub use raster::{RasterNormalizer, sniff_mime};

use crate::payload::ImagePayload;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image as {0}")]
    Encode(String),
}

/// Turns uploaded image bytes into a payload ready for codec selection.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, bytes: &[u8]) -> Result<ImagePayload, NormalizeError>;
}
