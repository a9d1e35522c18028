//! The raw image as produced by the normalizer.
//!
//! An [`ImagePayload`] pairs the data-URL header (`data:image/png;base64`)
//! with the decoded raster bytes. Its text form is always canonical,
//! padded, standard-alphabet base64, which is what makes byte-exact round
//! trips through the text-level codecs possible: a payload that parsed
//! successfully re-renders to exactly the string it was parsed from.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("not a data URL: missing ',' separator")]
    MissingSeparator,
    #[error("not a data URL: header {0:?} does not start with \"data:\"")]
    NotDataUrl(String),
    #[error("data URL header {0:?} is not base64-encoded")]
    NotBase64(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Strict decode: padding is required and trailing bits must be zero, so
/// anything accepted re-encodes to the identical text.
pub(crate) fn base64_decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

/// Normalized image bytes plus the data-URL header describing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_header: String,
    bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_header: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_header: mime_header.into(),
            bytes,
        }
    }

    /// Build a payload from a mime type such as `image/webp`.
    pub fn from_mime_type(mime_type: &str, bytes: Vec<u8>) -> Self {
        Self::new(format!("data:{mime_type};base64"), bytes)
    }

    /// Parse an untagged `data:<mime>;base64,<payload>` string.
    pub fn from_data_url(url: &str) -> Result<Self, PayloadError> {
        let (header, body) = url
            .split_once(',')
            .ok_or(PayloadError::MissingSeparator)?;
        if !header.starts_with("data:") {
            return Err(PayloadError::NotDataUrl(header.to_string()));
        }
        if !header.ends_with(";base64") {
            return Err(PayloadError::NotBase64(header.to_string()));
        }
        Ok(Self::new(header, base64_decode(body)?))
    }

    pub fn mime_header(&self) -> &str {
        &self.mime_header
    }

    /// The bare mime type, e.g. `image/png`.
    pub fn mime_type(&self) -> &str {
        let rest = self
            .mime_header
            .strip_prefix("data:")
            .unwrap_or(&self.mime_header);
        rest.split(';').next().unwrap_or(rest)
    }

    pub fn is_webp(&self) -> bool {
        self.mime_type().eq_ignore_ascii_case("image/webp")
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Canonical base64 text of the bytes.
    pub fn base64(&self) -> String {
        base64_encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("{},{}", self.mime_header, self.base64())
    }
}
