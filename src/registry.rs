//! The set of codecs a pipeline may choose from.
//!
//! A [`CodecRegistry`] is built once, from config or by hand, and handed to
//! the [`CodecSelector`](crate::select::CodecSelector). Nothing about codec
//! availability is decided per call or held in process-wide state: two
//! registries in the same process can carry different codec sets and
//! transports without affecting each other.

use crate::codec::{Base85Codec, DictionaryCodec, Passthrough, PayloadCodec, Transport};
use crate::config::{CodecKind, CodecsConfig};
use crate::envelope::{DecodeError, EncodedEnvelope, Tag, unwrap};
use std::fmt;

/// Ordered collection of codec strategies.
///
/// `RAW` is never registered explicitly: it is the baseline every
/// selection falls back to and needs no encoder.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn PayloadCodec>>,
    transport: Transport,
}

impl CodecRegistry {
    /// A registry with no codecs; every selection will store `RAW`.
    pub fn empty(transport: Transport) -> Self {
        Self {
            codecs: Vec::new(),
            transport,
        }
    }

    /// Resolve the configured codec kinds into strategies.
    pub fn from_config(config: &CodecsConfig) -> Self {
        let mut registry = Self::empty(config.transport);
        for kind in &config.enabled {
            let codec: Box<dyn PayloadCodec> = match kind {
                CodecKind::Base85 => Box::new(Base85Codec),
                CodecKind::Dictionary => Box::new(DictionaryCodec::new(config.transport)),
                CodecKind::WebpMark => Box::new(Passthrough::webp_mark()),
            };
            registry.register(codec);
        }
        registry
    }

    /// Add a codec. A codec with the same tag as an existing one replaces it.
    pub fn register(&mut self, codec: Box<dyn PayloadCodec>) {
        let tag = codec.tag();
        self.codecs.retain(|c| c.tag() != tag);
        self.codecs.push(codec);
    }

    pub fn with(mut self, codec: Box<dyn PayloadCodec>) -> Self {
        self.register(codec);
        self
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn codecs(&self) -> impl Iterator<Item = &dyn PayloadCodec> {
        self.codecs.iter().map(|c| c.as_ref())
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.codecs.iter().map(|c| c.tag()).collect()
    }

    pub fn get(&self, tag: Tag) -> Option<&dyn PayloadCodec> {
        self.codecs().find(|c| c.tag() == tag)
    }

    /// Decode a stored string to its untagged data URL.
    ///
    /// Tags whose codec is registered decode through it; anything else
    /// falls back to the built-in codec for the tag, so strings written
    /// under a different codec set still decode.
    pub fn decode(&self, stored: &str) -> Result<String, DecodeError> {
        let envelope = unwrap(stored);
        self.decode_envelope(&envelope)
    }

    pub fn decode_envelope(&self, envelope: &EncodedEnvelope) -> Result<String, DecodeError> {
        match self.get(envelope.tag) {
            Some(codec) => envelope.to_raw_data_url_with(codec),
            None => envelope.to_raw_data_url(self.transport),
        }
    }

    /// Recover the original image bytes of an envelope.
    pub fn decode_bytes(&self, envelope: &EncodedEnvelope) -> Result<Vec<u8>, DecodeError> {
        match self.get(envelope.tag) {
            Some(codec) => envelope.decode_with(codec),
            None => envelope.decode_bytes(self.transport),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::from_config(&CodecsConfig::default())
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.tags())
            .field("transport", &self.transport)
            .finish()
    }
}
