//! Tagged data-URL envelope.
//!
//! ```text
//! data:<mime-type>[;base64],<TAG>:<payload>
//! ```
//!
//! | Token | Tag | Decode |
//! |---|---|---|
//! | (none) | [`Tag::Raw`] | identity |
//! | `WEBP:` | [`Tag::WebpMark`] | strip token |
//! | `B85:` | [`Tag::Base85`] | base85 → bytes → base64 |
//! | `LZDICT:`, `LZSTR:` | [`Tag::LzDict`] | dictionary → base64 |
//! | `OPTIMIZE:`, `NOCOMPRESS:` | [`Tag::Raw`] | strip token |
//!
//! Parsing never fails: a payload without a recognized token is treated as
//! raw, which keeps strings stored before tagging existed readable.
//! Decoding, on the other hand, reports every malformed payload to the
//! caller; only the export boundary decides to fall back to the original.

use crate::codec::{Base85Codec, CodecError, DictionaryCodec, Passthrough, PayloadCodec, Transport};
use crate::payload::{ImagePayload, base64_encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Codec identifier carried inside the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    #[serde(rename = "RAW")]
    Raw,
    #[serde(rename = "WEBP_MARK")]
    WebpMark,
    #[serde(rename = "BASE85")]
    Base85,
    #[serde(rename = "LZDICT")]
    LzDict,
}

/// Recognized tokens, in the order they are tried.
const TOKENS: &[(&str, Tag)] = &[
    ("WEBP:", Tag::WebpMark),
    ("B85:", Tag::Base85),
    ("LZDICT:", Tag::LzDict),
    ("LZSTR:", Tag::LzDict),
    ("OPTIMIZE:", Tag::Raw),
    ("NOCOMPRESS:", Tag::Raw),
];

impl Tag {
    /// Token written in front of the payload. `RAW` writes none.
    pub fn token(self) -> Option<&'static str> {
        match self {
            Tag::Raw => None,
            Tag::WebpMark => Some("WEBP:"),
            Tag::Base85 => Some("B85:"),
            Tag::LzDict => Some("LZDICT:"),
        }
    }

    /// Relative decode cost; lower is cheaper. Used to break size ties.
    pub fn decode_cost(self) -> u8 {
        match self {
            Tag::Raw => 0,
            Tag::WebpMark => 1,
            Tag::Base85 => 2,
            Tag::LzDict => 3,
        }
    }

    /// Whether the payload is a transformation of the base64 text rather
    /// than the text itself.
    pub fn is_compressed(self) -> bool {
        matches!(self, Tag::Base85 | Tag::LzDict)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tag::Raw => "RAW",
            Tag::WebpMark => "WEBP_MARK",
            Tag::Base85 => "BASE85",
            Tag::LzDict => "LZDICT",
        })
    }
}

/// A decode failure for one envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot decode {tag} payload: {source}")]
pub struct DecodeError {
    pub tag: Tag,
    pub source: CodecError,
}

/// Mime header, codec tag, and encoded payload of a stored image string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEnvelope {
    pub mime_header: String,
    pub tag: Tag,
    pub payload: String,
}

impl EncodedEnvelope {
    pub fn new(mime_header: impl Into<String>, tag: Tag, payload: impl Into<String>) -> Self {
        Self {
            mime_header: mime_header.into(),
            tag,
            payload: payload.into(),
        }
    }

    /// Untransformed envelope of `payload`.
    pub fn raw(payload: &ImagePayload) -> Self {
        Self::new(payload.mime_header(), Tag::Raw, payload.base64())
    }

    /// Decode the payload back to image bytes with `codec`.
    pub fn decode_with(&self, codec: &dyn PayloadCodec) -> Result<Vec<u8>, DecodeError> {
        codec.decode(&self.payload).map_err(|source| DecodeError {
            tag: self.tag,
            source,
        })
    }

    /// Decode the payload back to image bytes with the built-in codec for
    /// its tag.
    pub fn decode_bytes(&self, transport: Transport) -> Result<Vec<u8>, DecodeError> {
        match self.tag {
            Tag::Raw => self.decode_with(&Passthrough::raw()),
            Tag::WebpMark => self.decode_with(&Passthrough::webp_mark()),
            Tag::Base85 => self.decode_with(&Base85Codec),
            Tag::LzDict => self.decode_with(&DictionaryCodec::new(transport)),
        }
    }

    /// Decode to the literal untagged data URL.
    ///
    /// Passthrough tags only lose their token; their payload is not
    /// validated, matching how untagged strings are returned as-is.
    pub fn to_raw_data_url(&self, transport: Transport) -> Result<String, DecodeError> {
        match self.tag {
            Tag::Base85 => self.to_raw_data_url_with(&Base85Codec),
            Tag::LzDict => self.to_raw_data_url_with(&DictionaryCodec::new(transport)),
            Tag::Raw | Tag::WebpMark => Ok(join(&self.mime_header, &self.payload)),
        }
    }

    /// Like [`to_raw_data_url`](Self::to_raw_data_url), decoding compressed
    /// payloads with `codec`.
    pub fn to_raw_data_url_with(&self, codec: &dyn PayloadCodec) -> Result<String, DecodeError> {
        let body = if self.tag.is_compressed() {
            base64_encode(&self.decode_with(codec)?)
        } else {
            self.payload.clone()
        };
        Ok(join(&self.mime_header, &body))
    }
}

impl fmt::Display for EncodedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag.token() {
            Some(token) => write!(f, "{},{}", self.mime_header, token)?,
            None if !self.mime_header.is_empty() => write!(f, "{},", self.mime_header)?,
            None => {}
        }
        f.write_str(&self.payload)
    }
}

fn join(mime_header: &str, body: &str) -> String {
    if mime_header.is_empty() {
        body.to_string()
    } else {
        format!("{mime_header},{body}")
    }
}

/// Build the stored string for a payload.
pub fn wrap(mime_header: &str, tag: Tag, payload: &str) -> String {
    EncodedEnvelope::new(mime_header, tag, payload).to_string()
}

/// Split a stored string into mime header, tag, and payload.
///
/// A tagged payload always follows a `,`, even when the header before it
/// is empty. Any other string without a header is a raw payload in its
/// entirety.
pub fn unwrap(stored: &str) -> EncodedEnvelope {
    let Some((mime_header, rest)) = stored.split_once(',') else {
        return EncodedEnvelope::new("", Tag::Raw, stored);
    };
    for &(token, tag) in TOKENS {
        if let Some(payload) = rest.strip_prefix(token) {
            return EncodedEnvelope::new(mime_header, tag, payload);
        }
    }
    if mime_header.is_empty() {
        return EncodedEnvelope::new("", Tag::Raw, stored);
    }
    EncodedEnvelope::new(mime_header, Tag::Raw, rest)
}

/// Fully reverse a stored string to its untagged data URL using the
/// default dictionary transport. Untagged input is returned unchanged.
pub fn decode(stored: &str) -> Result<String, DecodeError> {
    decode_with_transport(stored, Transport::default())
}

pub fn decode_with_transport(stored: &str, transport: Transport) -> Result<String, DecodeError> {
    unwrap(stored).to_raw_data_url(transport)
}
