//! Payload codecs.
//!
//! | Tag | Codec | Encoded form |
//! |---|---|---|
//! | `RAW` | [`Passthrough`] | canonical base64 of the image bytes |
//! | `WEBP_MARK` | [`Passthrough`] | same as RAW, only offered for WebP payloads |
//! | `BASE85` | [`Base85Codec`] | [`base85`] of the image bytes |
//! | `LZDICT` | [`DictionaryCodec`] | [`dictionary`] compression of the base64 text |
//!
//! Every codec implements [`PayloadCodec`], so the selector and the
//! envelope decoder never need to know which concrete codecs exist.

pub mod base85;
pub mod bitstream;
pub mod dictionary;

pub use bitstream::Transport;

use crate::envelope::Tag;
use crate::payload::{ImagePayload, base64_decode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid symbol {symbol:?} at offset {offset}")]
    InvalidSymbol { symbol: char, offset: usize },
    #[error("invalid encoded length {0}")]
    InvalidLength(usize),
    #[error("group at offset {0} does not fit in 32 bits")]
    Overflow(usize),
    #[error("stream ended before the end-of-stream code")]
    Truncated,
    #[error("code {code} is past the next dictionary entry {next}")]
    InvalidCode { code: u32, next: u32 },
    #[error("literal {0:#x} is not a Unicode scalar value")]
    InvalidLiteral(u32),
    #[error("payload is not canonical base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("{0} output did not decode back to the original bytes")]
    RoundTripMismatch(Tag),
}

/// A reversible payload transformation identified by its [`Tag`].
pub trait PayloadCodec: Send + Sync {
    fn tag(&self) -> Tag;

    /// Whether this codec should be tried for `payload` at all.
    fn applies_to(&self, _payload: &ImagePayload) -> bool {
        true
    }

    fn encode(&self, payload: &ImagePayload) -> Result<String, CodecError>;

    /// Recover the original image bytes from an encoded payload.
    fn decode(&self, encoded: &str) -> Result<Vec<u8>, CodecError>;
}

/// Stores the base64 payload untouched. Backs both `RAW` and `WEBP_MARK`.
#[derive(Debug, Clone, Copy)]
pub struct Passthrough {
    tag: Tag,
}

impl Passthrough {
    pub fn raw() -> Self {
        Self { tag: Tag::Raw }
    }

    pub fn webp_mark() -> Self {
        Self {
            tag: Tag::WebpMark,
        }
    }
}

impl PayloadCodec for Passthrough {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn applies_to(&self, payload: &ImagePayload) -> bool {
        self.tag != Tag::WebpMark || payload.is_webp()
    }

    fn encode(&self, payload: &ImagePayload) -> Result<String, CodecError> {
        Ok(payload.base64())
    }

    fn decode(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        Ok(base64_decode(encoded)?)
    }
}

/// Packs the decoded image bytes 4 → 5, beating base64's 3 → 4.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base85Codec;

impl PayloadCodec for Base85Codec {
    fn tag(&self) -> Tag {
        Tag::Base85
    }

    fn encode(&self, payload: &ImagePayload) -> Result<String, CodecError> {
        Ok(base85::encode(payload.bytes()))
    }

    fn decode(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        base85::decode(encoded)
    }
}

/// Compresses the base64 text of the payload with the adaptive dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictionaryCodec {
    transport: Transport,
}

impl DictionaryCodec {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }
}

impl PayloadCodec for DictionaryCodec {
    fn tag(&self) -> Tag {
        Tag::LzDict
    }

    fn encode(&self, payload: &ImagePayload) -> Result<String, CodecError> {
        Ok(dictionary::compress(&payload.base64(), self.transport))
    }

    fn decode(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        let text = dictionary::decompress(encoded, self.transport)?;
        Ok(base64_decode(&text)?)
    }
}
