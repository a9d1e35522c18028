//! Export boundary: turn stored image strings back into literal data URLs.
//!
//! Stored strings keep their tagged, compressed form; only the rendered
//! artifact needs plain `data:` URLs a browser understands. This is also
//! where decode failures stop: a string that cannot be decoded is exported
//! exactly as stored, so one corrupt image never breaks the export.

use crate::registry::CodecRegistry;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::warn;

static DATA_URL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|\s)(src|href)=(?:"(data:[^"]*)"|'(data:[^']*)')"#)
        .expect("valid data URL attribute regex")
});

/// Decode `stored` with the built-in codecs, or return it unchanged.
pub fn resolve_for_export(stored: &str) -> String {
    resolve_for_export_with(&CodecRegistry::default(), stored)
}

pub fn resolve_for_export_with(registry: &CodecRegistry, stored: &str) -> String {
    match registry.decode(stored) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "cannot decode stored image, exporting it unchanged");
            stored.to_string()
        }
    }
}

/// Resolve every `src` and `href` attribute in `html` whose value is a
/// `data:` URL, in either quote style.
pub fn decode_embedded_urls(html: &str) -> String {
    decode_embedded_urls_with(&CodecRegistry::default(), html)
}

pub fn decode_embedded_urls_with(registry: &CodecRegistry, html: &str) -> String {
    DATA_URL_ATTR
        .replace_all(html, |caps: &Captures| {
            let (quote, value) = match caps.get(3) {
                Some(value) => ('"', value.as_str()),
                None => ('\'', caps.get(4).map_or("", |v| v.as_str())),
            };
            format!(
                "{}{}={quote}{}{quote}",
                &caps[1],
                &caps[2],
                resolve_for_export_with(registry, value)
            )
        })
        .into_owned()
}
