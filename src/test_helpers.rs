//! Shared test utilities for the avatar-codec test suite.
//!
//! Provides sample payloads, synthetic raster images, and stand-in codecs
//! and encoders whose output is fixed, failing, or deliberately wrong.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let registry = CodecRegistry::empty(Transport::UriSafe)
//!     .with(Box::new(FixedSizeCodec::new(Tag::Base85, 10)));
//! let encoder = MockEncoder::new().failing_on(png_payload().bytes());
//! ```

use std::io::Cursor;
use std::sync::Mutex;

use image::{ImageFormat, RgbImage};

use crate::batch::{OptimizeError, PayloadEncoder};
use crate::codec::{CodecError, PayloadCodec, base85};
use crate::envelope::{EncodedEnvelope, Tag};
use crate::payload::ImagePayload;

// =========================================================================
// Sample payloads
// =========================================================================

/// The 8-byte PNG signature, `data:image/png;base64,iVBORw0KGgo=`.
pub fn png_payload() -> ImagePayload {
    ImagePayload::new(
        "data:image/png;base64",
        vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
    )
}

/// A WebP-typed payload large enough to be worth compressing.
pub fn webp_payload() -> ImagePayload {
    let mut bytes = b"RIFF\0\0\0\0WEBPVP8L".to_vec();
    bytes.extend((0..2000u32).map(|i| (i * 7 % 251) as u8));
    ImagePayload::from_mime_type("image/webp", bytes)
}

/// A payload whose bytes are `seed` repeated, distinct per seed.
pub fn seeded_payload(seed: u8) -> ImagePayload {
    ImagePayload::new("data:image/png;base64", vec![seed; 400])
}

// =========================================================================
// Synthetic rasters
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

fn encode_raster(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    gradient(width, height).write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// A valid PNG file of the given dimensions.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    encode_raster(width, height, ImageFormat::Png)
}

/// A valid JPEG file of the given dimensions.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_raster(width, height, ImageFormat::Jpeg)
}

// =========================================================================
// Stand-in codecs
// =========================================================================

/// Encodes every payload to `len` copies of `x`, decoding to fixed bytes.
///
/// Only useful with verification off, unless `decodes_to` is set to the
/// payload under test.
pub struct FixedSizeCodec {
    tag: Tag,
    len: usize,
    decodes_to: Vec<u8>,
}

impl FixedSizeCodec {
    pub fn new(tag: Tag, len: usize) -> Self {
        Self {
            tag,
            len,
            decodes_to: Vec::new(),
        }
    }

    pub fn decoding_to(mut self, bytes: &[u8]) -> Self {
        self.decodes_to = bytes.to_vec();
        self
    }
}

impl PayloadCodec for FixedSizeCodec {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn encode(&self, _payload: &ImagePayload) -> Result<String, CodecError> {
        Ok("x".repeat(self.len))
    }

    fn decode(&self, _encoded: &str) -> Result<Vec<u8>, CodecError> {
        Ok(self.decodes_to.clone())
    }
}

/// Always fails to encode.
pub struct FailingCodec {
    tag: Tag,
}

impl FailingCodec {
    pub fn new(tag: Tag) -> Self {
        Self { tag }
    }
}

impl PayloadCodec for FailingCodec {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn encode(&self, _payload: &ImagePayload) -> Result<String, CodecError> {
        Err(CodecError::InvalidLength(0))
    }

    fn decode(&self, _encoded: &str) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Truncated)
    }
}

/// Encodes with base85 but decodes with the first byte flipped.
pub struct CorruptingCodec {
    tag: Tag,
}

impl CorruptingCodec {
    pub fn new(tag: Tag) -> Self {
        Self { tag }
    }
}

impl PayloadCodec for CorruptingCodec {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn encode(&self, payload: &ImagePayload) -> Result<String, CodecError> {
        Ok(base85::encode(payload.bytes()))
    }

    fn decode(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        let mut bytes = base85::decode(encoded)?;
        if let Some(first) = bytes.first_mut() {
            *first ^= 0xFF;
        }
        Ok(bytes)
    }
}

// =========================================================================
// Mock encoder
// =========================================================================

/// Encoder that tags every payload `BASE85`, failing on chosen inputs.
///
/// Uses Mutex (not RefCell) so it is Sync, as `PayloadEncoder` requires.
#[derive(Default)]
pub struct MockEncoder {
    fail_on: Vec<Vec<u8>>,
    params_hash: Option<String>,
    calls: Mutex<Vec<Vec<u8>>>,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, bytes: &[u8]) -> Self {
        self.fail_on.push(bytes.to_vec());
        self
    }

    /// Opt in to caching under `hash`.
    pub fn with_params_hash(mut self, hash: &str) -> Self {
        self.params_hash = Some(hash.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PayloadEncoder for MockEncoder {
    fn encode(&self, payload: &ImagePayload) -> Result<EncodedEnvelope, OptimizeError> {
        self.calls.lock().unwrap().push(payload.bytes().to_vec());
        if self.fail_on.iter().any(|b| b == payload.bytes()) {
            return Err(OptimizeError::Encoder("mock failure".to_string()));
        }
        Ok(EncodedEnvelope::new(
            payload.mime_header(),
            Tag::Base85,
            base85::encode(payload.bytes()),
        ))
    }

    fn params_hash(&self) -> Option<String> {
        self.params_hash.clone()
    }
}
