//! # Avatar Codec
//!
//! Tagged, reversible compression of profile-image data URLs. Chat-log
//! exports embed one avatar per user as a `data:` URL; this crate makes those
//! strings as small as it can while guaranteeing that decoding reproduces the
//! original image bytes exactly.
//!
//! # Architecture: Normalize, Select, Wrap
//!
//! ```text
//! 1. Normalize  upload bytes   →  ImagePayload     (one size, one format)
//! 2. Select     ImagePayload   →  CodecCandidate   (every codec, smallest wins)
//! 3. Wrap       candidate      →  stored string    ("<header>,<TAG>:<payload>")
//! ```
//!
//! The reverse path reads the tag back out of the stored string and runs the
//! matching decoder. Strings without a tag are plain data URLs and decode to
//! themselves, so anything a browser already understands is valid input.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`payload`] | `ImagePayload`: mime header plus raw bytes, canonical base64 data URLs |
//! | [`codec`] | `PayloadCodec` strategies: Base85, LZ-style dictionary, WebP passthrough |
//! | [`envelope`] | Tag tokens, `wrap`/`unwrap`, decoding a stored string back to its data URL |
//! | [`registry`] | The caller-owned set of codecs a pipeline may choose from |
//! | [`select`] | Runs every applicable codec and keeps the smallest that clears the savings threshold |
//! | [`cache`] | Content-addressed memo of selection results, persisted between batch runs |
//! | [`batch`] | Bounded-concurrency optimizer with per-item failure isolation |
//! | [`normalize`] | Decodes uploads and re-encodes them at the configured size and format |
//! | [`export`] | Replaces stored strings in rendered HTML with plain data URLs |
//! | [`config`] | `avatar-codec.toml` loading, validation, and the stock template |
//! | [`output`] | CLI output formatting for batch reports and `inspect` |
//!
//! # Design Decisions
//!
//! ## Tags Inside the Data URL
//!
//! The codec tag sits right after the comma, where the base64 payload would
//! start. A stored string therefore keeps its `data:image/...` header, so
//! tools that only look at the mime type keep working, and the tag alphabet
//! (`B85:`, `LZDICT:`, `WEBP:`) can never be confused with base64 because
//! `:` is not a base64 character.
//!
//! ## Smallest Wins, But Only By a Margin
//!
//! Every compressed form costs a decode step. A candidate is only stored if
//! it beats the raw base64 by `min_savings` (5% by default); otherwise the
//! plain data URL is kept. See [`select::SelectionPolicy`].
//!
//! ## No Global State
//!
//! Codec availability lives in a [`registry::CodecRegistry`] and memoized
//! results in a [`cache::SelectionCache`], both passed in by the caller. Two
//! pipelines with different codec sets can run side by side in one process.

pub mod batch;
pub mod cache;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod export;
pub mod normalize;
pub mod output;
pub mod payload;
pub mod registry;
pub mod select;

#[cfg(test)]
pub(crate) mod test_helpers;
