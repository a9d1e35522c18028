//! Batch optimization of many profile images.
//!
//! Images are encoded in fixed-size batches (default 5). Every task in a
//! batch is awaited together with `join_all`, and batch N+1 does not start
//! until every task of batch N has settled. Encoding itself is synchronous;
//! batching only bounds how much work is in flight at once.
//!
//! ## Failure isolation
//!
//! A failing image never aborts the run. Its original payload is kept as a
//! `RAW` envelope and the failure is recorded in the [`BatchReport`]. The
//! output always has one entry per input payload. Uploads that cannot even
//! be recognized as an image have no payload to keep and are reported as
//! rejected instead.
//!
//! ## Caching
//!
//! When the encoder reports a [`params_hash`](PayloadEncoder::params_hash),
//! a caller-supplied [`SelectionCache`] is consulted before each batch and
//! updated after it settles. Only successful encodes are cached.

use crate::cache::{SelectionCache, hash_payload};
use crate::envelope::{EncodedEnvelope, Tag};
use crate::normalize::{NormalizeError, Normalizer, sniff_mime};
use crate::payload::ImagePayload;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("normalize failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("encoder failed: {0}")]
    Encoder(String),
}

/// Produces the stored envelope for one payload.
pub trait PayloadEncoder: Send + Sync {
    fn encode(&self, payload: &ImagePayload) -> Result<EncodedEnvelope, OptimizeError>;

    /// Hash of every setting that affects [`encode`](Self::encode). `None`
    /// disables caching.
    fn params_hash(&self) -> Option<String> {
        None
    }
}

/// What happened to one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Encoded,
    Cached,
    /// Encoding failed; the original is stored untransformed.
    Preserved,
    /// Not an image; nothing is stored.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub username: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<Tag>,
    /// Length of the untagged data URL (or upload size, when rejected).
    pub raw_size: usize,
    /// Length of the stored string.
    pub stored_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Per-image outcomes, sorted by username.
    pub items: Vec<ItemReport>,
    pub batches: usize,
}

impl BatchReport {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Items that were preserved or rejected.
    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::Preserved | ItemStatus::Rejected))
    }

    pub fn raw_total(&self) -> usize {
        self.items.iter().map(|i| i.raw_size).sum()
    }

    pub fn stored_total(&self) -> usize {
        self.items.iter().map(|i| i.stored_size).sum()
    }
}

/// Envelopes keyed by username, plus the run's report.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub envelopes: BTreeMap<String, EncodedEnvelope>,
    pub report: BatchReport,
}

impl BatchResult {
    fn record(
        &mut self,
        username: String,
        payload: &ImagePayload,
        envelope: EncodedEnvelope,
        status: ItemStatus,
        error: Option<String>,
    ) {
        self.report.items.push(ItemReport {
            username: username.clone(),
            status,
            tag: Some(envelope.tag),
            raw_size: payload.to_data_url().len(),
            stored_size: envelope.to_string().len(),
            error,
        });
        self.envelopes.insert(username, envelope);
    }

    fn reject(&mut self, username: String, upload_size: usize, error: String) {
        self.report.items.push(ItemReport {
            username,
            status: ItemStatus::Rejected,
            tag: None,
            raw_size: upload_size,
            stored_size: 0,
            error: Some(error),
        });
    }

    fn finish(mut self) -> Self {
        self.report
            .items
            .sort_by(|a, b| a.username.cmp(&b.username));
        self
    }
}

/// Split `items` into owned batches of at most `size`.
fn into_batches<T>(items: impl IntoIterator<Item = T>, size: usize) -> Vec<Vec<T>> {
    let mut iter = items.into_iter();
    let mut batches = Vec::new();
    loop {
        let batch: Vec<T> = iter.by_ref().take(size).collect();
        if batch.is_empty() {
            return batches;
        }
        batches.push(batch);
    }
}

pub struct BatchOptimizer<E> {
    encoder: E,
    batch_size: usize,
}

impl<E: PayloadEncoder> BatchOptimizer<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Encode every payload, keyed by username.
    pub async fn optimize_all(
        &self,
        images: BTreeMap<String, ImagePayload>,
        mut cache: Option<&mut SelectionCache>,
    ) -> BatchResult {
        let mut out = BatchResult::default();
        for (n, batch) in into_batches(images, self.batch_size).into_iter().enumerate() {
            let size = batch.len();
            self.encode_batch(batch, cache.as_deref_mut(), &mut out).await;
            out.report.batches += 1;
            info!(batch = n + 1, images = size, "batch settled");
        }
        out.finish()
    }

    /// Normalize raw uploads, then encode them, in the same batches.
    pub async fn optimize_uploads(
        &self,
        normalizer: &dyn Normalizer,
        uploads: BTreeMap<String, Vec<u8>>,
        mut cache: Option<&mut SelectionCache>,
    ) -> BatchResult {
        let mut out = BatchResult::default();
        for (n, batch) in into_batches(uploads, self.batch_size).into_iter().enumerate() {
            let size = batch.len();
            let tasks = batch.into_iter().map(|(username, bytes)| async move {
                let result = normalizer.normalize(&bytes);
                (username, bytes, result)
            });

            let mut ready = Vec::new();
            for (username, bytes, result) in join_all(tasks).await {
                match result {
                    Ok(payload) => ready.push((username, payload)),
                    Err(e) => self.keep_upload(&mut out, username, bytes, e),
                }
            }

            self.encode_batch(ready, cache.as_deref_mut(), &mut out).await;
            out.report.batches += 1;
            info!(batch = n + 1, images = size, "batch settled");
        }
        out.finish()
    }

    /// Store an upload the normalizer failed on, unchanged, if it is
    /// recognizably an image.
    fn keep_upload(
        &self,
        out: &mut BatchResult,
        username: String,
        bytes: Vec<u8>,
        error: NormalizeError,
    ) {
        let error = OptimizeError::from(error);
        match sniff_mime(&bytes) {
            Some(mime_type) => {
                warn!(%username, %error, "normalize failed, keeping original upload");
                let payload = ImagePayload::from_mime_type(mime_type, bytes);
                let envelope = EncodedEnvelope::raw(&payload);
                out.record(
                    username,
                    &payload,
                    envelope,
                    ItemStatus::Preserved,
                    Some(error.to_string()),
                );
            }
            None => {
                warn!(%username, %error, "upload is not an image, dropping it");
                out.reject(username, bytes.len(), error.to_string());
            }
        }
    }

    async fn encode_batch(
        &self,
        batch: Vec<(String, ImagePayload)>,
        mut cache: Option<&mut SelectionCache>,
        out: &mut BatchResult,
    ) {
        let params_hash = self.encoder.params_hash();

        let mut pending = Vec::with_capacity(batch.len());
        for (username, payload) in batch {
            let source_hash = hash_payload(&payload);
            let cached = match (cache.as_deref_mut(), &params_hash) {
                (Some(cache), Some(params)) => cache.get(&source_hash, params),
                _ => None,
            };
            match cached {
                Some(envelope) => {
                    out.record(username, &payload, envelope, ItemStatus::Cached, None);
                }
                None => pending.push((username, payload, source_hash)),
            }
        }

        let encoder = &self.encoder;
        let tasks = pending
            .into_iter()
            .map(|(username, payload, source_hash)| async move {
                let result = encoder.encode(&payload);
                (username, payload, source_hash, result)
            });

        for (username, payload, source_hash, result) in join_all(tasks).await {
            match result {
                Ok(envelope) => {
                    if let (Some(cache), Some(params)) = (cache.as_deref_mut(), &params_hash) {
                        cache.insert(&source_hash, params, &envelope);
                    }
                    out.record(username, &payload, envelope, ItemStatus::Encoded, None);
                }
                Err(e) => {
                    warn!(%username, error = %e, "encoding failed, keeping original");
                    let envelope = EncodedEnvelope::raw(&payload);
                    out.record(
                        username,
                        &payload,
                        envelope,
                        ItemStatus::Preserved,
                        Some(e.to_string()),
                    );
                }
            }
        }
    }
}
