//! Codec selection.
//!
//! For one [`ImagePayload`] the selector runs every registered codec that
//! applies, measures each encoded payload, and stores the smallest. The
//! rules, in order:
//!
//! 1. **Baseline**: `WEBP_MARK` when the payload is WebP and the codec is
//!    registered, otherwise `RAW`. The baseline is always a valid answer.
//! 2. **Failures**: a codec that errors, or whose output does not decode
//!    back to the original bytes (when `verify` is on), is dropped and
//!    logged. It never fails the selection.
//! 3. **Threshold**: a compressing candidate (`BASE85`, `LZDICT`) only
//!    competes if `size <= raw_size * (1 - min_savings)`.
//! 4. **Winner**: smallest size, ties broken by [`Tag::decode_cost`].
//!
//! Size is the UTF-8 length of the encoded payload; the mime header and tag
//! token are identical overhead for every candidate and are not counted.

use crate::batch::{OptimizeError, PayloadEncoder};
use crate::cache::hash_selection_params;
use crate::codec::{CodecError, PayloadCodec};
use crate::config::CodecsConfig;
use crate::envelope::{DecodeError, EncodedEnvelope, Tag};
use crate::payload::ImagePayload;
use crate::registry::CodecRegistry;
use tracing::{debug, warn};

/// Default minimum fractional saving over the raw payload.
pub const DEFAULT_MIN_SAVINGS: f64 = 0.05;

/// Tunables for [`CodecSelector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    pub min_savings: f64,
    pub verify: bool,
}

impl SelectionPolicy {
    pub fn from_config(config: &CodecsConfig) -> Self {
        Self {
            min_savings: config.min_savings,
            verify: config.verify,
        }
    }

    /// Largest payload a compressing codec may produce and still be stored.
    pub fn max_compressed_size(&self, raw_size: usize) -> f64 {
        raw_size as f64 * (1.0 - self.min_savings)
    }

    pub fn qualifies(&self, size: usize, raw_size: usize) -> bool {
        size as f64 <= self.max_compressed_size(raw_size)
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            min_savings: DEFAULT_MIN_SAVINGS,
            verify: true,
        }
    }
}

/// One codec's output for a payload. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCandidate {
    pub tag: Tag,
    pub encoded: String,
    pub size: usize,
}

impl CodecCandidate {
    pub fn new(tag: Tag, encoded: String) -> Self {
        Self {
            tag,
            size: encoded.len(),
            encoded,
        }
    }

    fn rank(&self) -> (usize, u8) {
        (self.size, self.tag.decode_cost())
    }
}

#[derive(Debug, Default)]
pub struct CodecSelector {
    registry: CodecRegistry,
    policy: SelectionPolicy,
}

impl CodecSelector {
    pub fn new(registry: CodecRegistry, policy: SelectionPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn from_config(config: &CodecsConfig) -> Self {
        Self::new(
            CodecRegistry::from_config(config),
            SelectionPolicy::from_config(config),
        )
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Run every applicable codec, keeping the outputs that succeeded and
    /// (if enabled) verified. The threshold is not applied here.
    pub fn candidates(&self, payload: &ImagePayload) -> Vec<CodecCandidate> {
        self.registry
            .codecs()
            .filter(|codec| codec.applies_to(payload))
            .filter_map(|codec| self.try_codec(codec, payload))
            .collect()
    }

    fn try_codec(
        &self,
        codec: &dyn PayloadCodec,
        payload: &ImagePayload,
    ) -> Option<CodecCandidate> {
        let tag = codec.tag();
        let encoded = match codec.encode(payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(%tag, error = %e, "codec failed, dropping candidate");
                return None;
            }
        };
        if self.policy.verify {
            if let Err(e) = verify_round_trip(codec, &encoded, payload) {
                warn!(%tag, error = %e, "codec output did not verify, dropping candidate");
                return None;
            }
        }
        let candidate = CodecCandidate::new(tag, encoded);
        debug!(%tag, size = candidate.size, "candidate");
        Some(candidate)
    }

    /// Choose the stored form of `payload`. Never fails.
    pub fn select_best(&self, payload: &ImagePayload) -> EncodedEnvelope {
        let raw = CodecCandidate::new(Tag::Raw, payload.base64());
        let raw_size = raw.size;
        let candidates = self.candidates(payload);

        let baseline = candidates
            .iter()
            .find(|c| c.tag == Tag::WebpMark)
            .cloned()
            .unwrap_or(raw);

        let winner = candidates
            .into_iter()
            .filter(|c| c.tag.is_compressed())
            .filter(|c| {
                let keep = self.policy.qualifies(c.size, raw_size);
                if !keep {
                    debug!(tag = %c.tag, size = c.size, raw_size, "below savings threshold");
                }
                keep
            })
            .chain(std::iter::once(baseline))
            .min_by_key(CodecCandidate::rank)
            .unwrap_or_else(|| CodecCandidate::new(Tag::Raw, payload.base64()));

        debug!(tag = %winner.tag, size = winner.size, raw_size, "selected");
        EncodedEnvelope::new(payload.mime_header(), winner.tag, winner.encoded)
    }

    /// Re-optimize a stored string.
    ///
    /// The input is decoded first, so an already-tagged string is not
    /// encoded twice. Anything that cannot be decoded or is not a base64
    /// data URL is returned unchanged.
    pub fn optimize_data_url(&self, stored: &str) -> String {
        let raw = match self.registry.decode(stored) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "cannot decode stored image, keeping it as-is");
                return stored.to_string();
            }
        };
        match ImagePayload::from_data_url(&raw) {
            Ok(payload) => self.select_best(&payload).to_string(),
            Err(e) => {
                debug!(error = %e, "not a base64 image data URL, keeping it as-is");
                stored.to_string()
            }
        }
    }

    /// Decode a stored string with this selector's registry.
    pub fn decode(&self, stored: &str) -> Result<String, DecodeError> {
        self.registry.decode(stored)
    }
}

/// Decode `encoded` with `codec` and compare it against the source bytes.
fn verify_round_trip(
    codec: &dyn PayloadCodec,
    encoded: &str,
    payload: &ImagePayload,
) -> Result<(), CodecError> {
    if codec.decode(encoded)? == payload.bytes() {
        Ok(())
    } else {
        Err(CodecError::RoundTripMismatch(codec.tag()))
    }
}

impl PayloadEncoder for CodecSelector {
    fn encode(&self, payload: &ImagePayload) -> Result<EncodedEnvelope, OptimizeError> {
        Ok(self.select_best(payload))
    }

    fn params_hash(&self) -> Option<String> {
        Some(hash_selection_params(
            &self.registry.tags(),
            self.registry.transport(),
            self.policy.min_savings,
            self.policy.verify,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Base85Codec, DictionaryCodec, Passthrough, Transport};
    use crate::envelope::{decode, unwrap};
    use crate::test_helpers::{
        CorruptingCodec, FailingCodec, FixedSizeCodec, png_payload, webp_payload,
    };

    fn selector_with(codecs: Vec<Box<dyn PayloadCodec>>, verify: bool) -> CodecSelector {
        let mut registry = CodecRegistry::empty(Transport::UriSafe);
        for codec in codecs {
            registry.register(codec);
        }
        CodecSelector::new(
            registry,
            SelectionPolicy {
                verify,
                ..SelectionPolicy::default()
            },
        )
    }

    /// Highly repetitive base64 text of roughly 50 KB.
    fn repetitive_payload() -> ImagePayload {
        let bytes: Vec<u8> = (0..37_500).map(|i| [0x00, 0x10, 0x83][i % 3]).collect();
        ImagePayload::new("data:image/png;base64", bytes)
    }

    // =========================================================================
    // Threshold
    // =========================================================================

    #[test]
    fn two_percent_saving_stores_raw_unchanged() {
        let payload = ImagePayload::new("data:image/png;base64", vec![0x5A; 3000]);
        let raw_size = payload.base64().len();
        let selector = selector_with(
            vec![Box::new(FixedSizeCodec::new(Tag::Base85, raw_size * 98 / 100))],
            false,
        );

        let envelope = selector.select_best(&payload);
        assert_eq!(envelope.tag, Tag::Raw);
        assert_eq!(envelope.to_string(), payload.to_data_url());
    }

    #[test]
    fn exactly_five_percent_saving_qualifies() {
        let payload = ImagePayload::new("data:image/png;base64", vec![0x5A; 3000]);
        let raw_size = payload.base64().len();
        assert_eq!(raw_size, 4000);
        let selector = selector_with(
            vec![Box::new(FixedSizeCodec::new(Tag::Base85, 3800))],
            false,
        );
        assert_eq!(selector.select_best(&payload).tag, Tag::Base85);
    }

    #[test]
    fn policy_threshold_is_configurable() {
        let policy = SelectionPolicy {
            min_savings: 0.5,
            verify: true,
        };
        assert!(policy.qualifies(50, 100));
        assert!(!policy.qualifies(51, 100));
        assert!(SelectionPolicy::default().qualifies(95, 100));
    }

    // =========================================================================
    // Winner choice
    // =========================================================================

    #[test]
    fn repetitive_payload_picks_dictionary() {
        let payload = repetitive_payload();
        let raw_size = payload.base64().len();
        assert!(raw_size >= 50_000);

        let selector = CodecSelector::default();
        let candidates = selector.candidates(&payload);
        let size_of = |tag| {
            candidates
                .iter()
                .find(|c| c.tag == tag)
                .map(|c| c.size)
                .unwrap()
        };
        let lz = size_of(Tag::LzDict);
        assert!(lz < raw_size);
        assert!(lz < size_of(Tag::Base85));

        let envelope = selector.select_best(&payload);
        assert_eq!(envelope.tag, Tag::LzDict);
        assert_eq!(decode(&envelope.to_string()).unwrap(), payload.to_data_url());
    }

    #[test]
    fn equal_sizes_prefer_cheaper_decode() {
        let payload = ImagePayload::new("data:image/png;base64", vec![0x5A; 3000]);
        let selector = selector_with(
            vec![
                Box::new(FixedSizeCodec::new(Tag::LzDict, 100)),
                Box::new(FixedSizeCodec::new(Tag::Base85, 100)),
            ],
            false,
        );
        assert_eq!(selector.select_best(&payload).tag, Tag::Base85);
    }

    #[test]
    fn smaller_beats_cheaper() {
        let payload = ImagePayload::new("data:image/png;base64", vec![0x5A; 3000]);
        let selector = selector_with(
            vec![
                Box::new(FixedSizeCodec::new(Tag::LzDict, 99)),
                Box::new(FixedSizeCodec::new(Tag::Base85, 100)),
            ],
            false,
        );
        assert_eq!(selector.select_best(&payload).tag, Tag::LzDict);
    }

    #[test]
    fn incompressible_payload_stays_raw() {
        // Twelve base64 characters give the dictionary nothing to reuse.
        let payload = png_payload();
        let selector = selector_with(vec![Box::new(DictionaryCodec::default())], true);
        assert_eq!(selector.select_best(&payload).tag, Tag::Raw);
    }

    // =========================================================================
    // WebP baseline
    // =========================================================================

    #[test]
    fn webp_payload_defaults_to_webp_mark() {
        let payload = webp_payload();
        let selector = selector_with(
            vec![
                Box::new(Passthrough::webp_mark()),
                Box::new(FixedSizeCodec::new(Tag::Base85, payload.base64().len())),
            ],
            false,
        );
        let envelope = selector.select_best(&payload);
        assert_eq!(envelope.tag, Tag::WebpMark);
        assert_eq!(envelope.payload, payload.base64());
        assert!(envelope.to_string().contains(",WEBP:"));
    }

    #[test]
    fn webp_payload_still_compresses_when_worth_it() {
        let payload = webp_payload();
        let selector = selector_with(
            vec![
                Box::new(Passthrough::webp_mark()),
                Box::new(FixedSizeCodec::new(Tag::Base85, 1)),
            ],
            false,
        );
        assert_eq!(selector.select_best(&payload).tag, Tag::Base85);
    }

    #[test]
    fn webp_mark_ignored_for_other_formats() {
        let selector = selector_with(vec![Box::new(Passthrough::webp_mark())], true);
        assert_eq!(selector.select_best(&png_payload()).tag, Tag::Raw);
        assert!(selector.candidates(&png_payload()).is_empty());
    }

    #[test]
    fn webp_without_mark_codec_is_raw() {
        let selector = selector_with(vec![], true);
        assert_eq!(selector.select_best(&webp_payload()).tag, Tag::Raw);
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn failing_codec_is_dropped() {
        let payload = ImagePayload::new("data:image/png;base64", vec![0x5A; 3000]);
        let selector = selector_with(
            vec![
                Box::new(FailingCodec::new(Tag::LzDict)),
                Box::new(Base85Codec),
            ],
            true,
        );
        assert_eq!(selector.candidates(&payload).len(), 1);
        assert_eq!(selector.select_best(&payload).tag, Tag::Base85);
    }

    #[test]
    fn all_codecs_failing_falls_back_to_raw() {
        let payload = png_payload();
        let selector = selector_with(
            vec![
                Box::new(FailingCodec::new(Tag::LzDict)),
                Box::new(FailingCodec::new(Tag::Base85)),
            ],
            true,
        );
        assert_eq!(selector.select_best(&payload), EncodedEnvelope::raw(&payload));
    }

    #[test]
    fn corrupting_codec_is_rejected_by_verification() {
        let payload = ImagePayload::new("data:image/png;base64", vec![0x5A; 3000]);
        let corrupting = || Box::new(CorruptingCodec::new(Tag::Base85));

        let verified = selector_with(vec![corrupting()], true);
        assert_eq!(verified.select_best(&payload).tag, Tag::Raw);

        let unverified = selector_with(vec![corrupting()], false);
        assert_eq!(unverified.select_best(&payload).tag, Tag::Base85);
    }

    #[test]
    fn verify_round_trip_reports_mismatch() {
        let payload = png_payload();
        let codec = CorruptingCodec::new(Tag::Base85);
        let encoded = codec.encode(&payload).unwrap();
        assert_eq!(
            verify_round_trip(&codec, &encoded, &payload),
            Err(CodecError::RoundTripMismatch(Tag::Base85))
        );

        let encoded = Base85Codec.encode(&payload).unwrap();
        assert_eq!(verify_round_trip(&Base85Codec, &encoded, &payload), Ok(()));
        assert!(matches!(
            verify_round_trip(&Base85Codec, "<<<<<", &payload),
            Err(CodecError::InvalidSymbol { .. })
        ));
    }

    // =========================================================================
    // End to end
    // =========================================================================

    #[test]
    fn png_signature_round_trips_through_base85() {
        let url = "data:image/png;base64,iVBORw0KGgo=";
        let payload = ImagePayload::from_data_url(url).unwrap();
        let selector = CodecSelector::new(
            CodecRegistry::empty(Transport::UriSafe).with(Box::new(Base85Codec)),
            SelectionPolicy::default(),
        );

        let envelope = selector.select_best(&payload);
        assert_eq!(envelope.tag, Tag::Base85);
        let stored = envelope.to_string();
        assert!(stored.starts_with("data:image/png;base64,B85:"));

        let bytes = unwrap(&stored).decode_bytes(Transport::UriSafe).unwrap();
        assert_eq!(bytes, payload.bytes());
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(&stored).unwrap(), url);
    }

    #[test]
    fn optimize_data_url_does_not_double_encode() {
        let payload = repetitive_payload();
        let selector = CodecSelector::default();
        let once = selector.optimize_data_url(&payload.to_data_url());
        let twice = selector.optimize_data_url(&once);
        assert_eq!(once, twice);
        assert_eq!(selector.decode(&twice).unwrap(), payload.to_data_url());
    }

    #[test]
    fn optimize_data_url_keeps_unusable_input() {
        let selector = CodecSelector::default();
        for input in [
            "https://example.com/avatar.png",
            "data:image/svg+xml,%3Csvg%3E",
            "data:image/png;base64,B85:!",
        ] {
            assert_eq!(selector.optimize_data_url(input), input);
        }
    }

    #[test]
    fn params_hash_tracks_policy() {
        let a = CodecSelector::default();
        let b = CodecSelector::new(
            CodecRegistry::default(),
            SelectionPolicy {
                verify: false,
                ..SelectionPolicy::default()
            },
        );
        assert!(a.params_hash().is_some());
        assert_ne!(a.params_hash(), b.params_hash());
    }
}
