//! Content-addressed memo of codec selections.
//!
//! Running every codec over an image, and verifying each candidate, is the
//! expensive part of the pipeline. Re-running a batch over the same profile
//! images (a re-export of the same chat, say) should not redo that work.
//!
//! ## Cache keys
//!
//! Lookups combine two SHA-256 hashes:
//!
//! - **`source_hash`**: the mime header and raw bytes of the payload. Usernames
//!   are deliberately not part of the key, so two users sharing an avatar
//!   share one entry.
//! - **`params_hash`**: everything that can change the selection outcome:
//!   the registered codec tags (in order), the dictionary transport, the
//!   savings threshold, and whether candidates are verified.
//!
//! ## Storage
//!
//! The cache is an ordinary value owned by the caller. The CLI persists it
//! as JSON next to the batch output; a library user can keep it in memory
//! or drop it. A file that is missing, corrupt, or from another format
//! version loads as an empty cache.

use crate::codec::Transport;
use crate::envelope::{EncodedEnvelope, Tag, unwrap};
use crate::payload::ImagePayload;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

/// Version of the on-disk format. Bump to invalidate every existing cache.
const CACHE_VERSION: u32 = 1;

/// Maps `"{source_hash}:{params_hash}"` to the stored envelope string.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SelectionCache {
    pub version: u32,
    pub entries: HashMap<String, String>,
    #[serde(skip)]
    stats: CacheStats,
}

impl SelectionCache {
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Load from `path`, or start empty if the file is unusable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("ignoring unreadable cache {}: {e}", path.display());
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            return Self::empty();
        }
        cache
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Look up a previous selection, counting the hit or miss.
    pub fn get(&mut self, source_hash: &str, params_hash: &str) -> Option<EncodedEnvelope> {
        let found = self
            .entries
            .get(&content_key(source_hash, params_hash))
            .map(|stored| unwrap(stored));
        match found {
            Some(_) => self.stats.hit(),
            None => self.stats.miss(),
        }
        found
    }

    pub fn insert(&mut self, source_hash: &str, params_hash: &str, envelope: &EncodedEnvelope) {
        self.entries
            .insert(content_key(source_hash, params_hash), envelope.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for SelectionCache {
    fn default() -> Self {
        Self::empty()
    }
}

fn content_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

/// SHA-256 of a payload's mime header and bytes, as hex.
pub fn hash_payload(payload: &ImagePayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.mime_header().as_bytes());
    hasher.update(b"\0");
    hasher.update(payload.bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of the selection parameters.
pub fn hash_selection_params(
    tags: &[Tag],
    transport: Transport,
    min_savings: f64,
    verify: bool,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"selection\0");
    for tag in tags {
        hasher.update(tag.to_string().as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(format!("{transport:?}").as_bytes());
    hasher.update(min_savings.to_le_bytes());
    hasher.update([u8::from(verify)]);
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}
