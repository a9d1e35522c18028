//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Batch
//!
//! ```text
//! 001 alice
//!     LZDICT: encoded
//!     Size: 24.0 KB → 9.3 KB (61% smaller)
//! 002 bob
//!     rejected: unrecognized image format
//!
//! Optimized 2 images in 1 batch: 1 encoded, 1 rejected
//! ```
//!
//! ## Inspect
//!
//! ```text
//! Header: data:image/png;base64
//! Tag: BASE85
//! Payload: 10 chars
//! Decoded: 8 bytes
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchReport, ItemReport, ItemStatus};
use crate::cache::CacheStats;
use crate::envelope::{DecodeError, EncodedEnvelope};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// `24.0 KB → 9.3 KB (61% smaller)`; the percentage is omitted when the
/// size did not shrink.
fn format_saving(raw: usize, stored: usize) -> String {
    let sizes = format!("{} \u{2192} {}", format_size(raw), format_size(stored));
    if raw == 0 || stored >= raw {
        return sizes;
    }
    let percent = ((raw - stored) as f64 / raw as f64 * 100.0).round() as u32;
    format!("{} ({}% smaller)", sizes, percent)
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Encoded => "encoded",
        ItemStatus::Cached => "cached",
        ItemStatus::Preserved => "preserved",
        ItemStatus::Rejected => "rejected",
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

// ============================================================================
// Batch output
// ============================================================================

/// Format one batch item: header line plus indented context.
pub fn format_batch_item(index: usize, item: &ItemReport) -> Vec<String> {
    let mut lines = vec![format!("{} {}", format_index(index), item.username)];
    let status = status_label(item.status);
    match item.tag {
        Some(tag) => {
            lines.push(format!("{}{}: {}", indent(1), tag, status));
            lines.push(format!(
                "{}Size: {}",
                indent(1),
                format_saving(item.raw_size, item.stored_size)
            ));
            if let Some(error) = &item.error {
                lines.push(format!("{}Error: {}", indent(1), error));
            }
        }
        None => {
            let error = item.error.as_deref().unwrap_or("unknown error");
            lines.push(format!("{}{}: {}", indent(1), status, error));
        }
    }
    lines
}

/// Format the summary line for a run, listing only non-zero outcomes.
pub fn format_batch_summary(report: &BatchReport) -> String {
    let counts: Vec<String> = [
        ItemStatus::Encoded,
        ItemStatus::Cached,
        ItemStatus::Preserved,
        ItemStatus::Rejected,
    ]
    .into_iter()
    .map(|status| (report.count(status), status_label(status)))
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{} {}", n, label))
    .collect();

    let head = format!(
        "Optimized {} in {}",
        plural(report.items.len(), "image", "images"),
        plural(report.batches, "batch", "batches")
    );
    if counts.is_empty() {
        head
    } else {
        format!("{}: {}", head, counts.join(", "))
    }
}

/// Format a whole batch run, optionally with cache statistics.
pub fn format_batch_report(report: &BatchReport, cache: Option<&CacheStats>) -> Vec<String> {
    let mut lines: Vec<String> = report
        .items
        .iter()
        .enumerate()
        .flat_map(|(i, item)| format_batch_item(i + 1, item))
        .collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format_batch_summary(report));
    if let Some(stats) = cache.filter(|s| s.total() > 0) {
        lines.push(format!("Cache: {}", stats));
    }
    lines
}

/// Print batch output to stdout.
pub fn print_batch_report(report: &BatchReport, cache: Option<&CacheStats>) {
    for line in format_batch_report(report, cache) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect output
// ============================================================================

/// Format the anatomy of a stored string and the result of decoding it.
pub fn format_inspect(
    envelope: &EncodedEnvelope,
    decoded: &Result<Vec<u8>, DecodeError>,
) -> Vec<String> {
    let header = if envelope.mime_header.is_empty() {
        "(none)"
    } else {
        envelope.mime_header.as_str()
    };
    let mut lines = vec![
        format!("Header: {}", header),
        format!("Tag: {}", envelope.tag),
        format!("Payload: {} chars", envelope.payload.len()),
    ];
    match decoded {
        Ok(bytes) => lines.push(format!("Decoded: {} bytes", bytes.len())),
        Err(e) => lines.push(format!("Decoded: failed ({})", e.source)),
    }
    lines
}

/// Print inspect output to stdout.
pub fn print_inspect(envelope: &EncodedEnvelope, decoded: &Result<Vec<u8>, DecodeError>) {
    for line in format_inspect(envelope, decoded) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use crate::envelope::Tag;

    fn item(username: &str, status: ItemStatus, tag: Option<Tag>) -> ItemReport {
        ItemReport {
            username: username.to_string(),
            status,
            tag,
            raw_size: 2048,
            stored_size: 1024,
            error: None,
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn format_saving_with_and_without_gain() {
        assert_eq!(format_saving(2048, 1024), "2.0 KB \u{2192} 1.0 KB (50% smaller)");
        assert_eq!(format_saving(100, 100), "100 B \u{2192} 100 B");
        assert_eq!(format_saving(0, 0), "0 B \u{2192} 0 B");
    }

    // =========================================================================
    // Batch formatting tests
    // =========================================================================

    #[test]
    fn format_encoded_item() {
        let lines = format_batch_item(1, &item("alice", ItemStatus::Encoded, Some(Tag::LzDict)));
        assert_eq!(
            lines,
            vec![
                "001 alice",
                "    LZDICT: encoded",
                "    Size: 2.0 KB \u{2192} 1.0 KB (50% smaller)",
            ]
        );
    }

    #[test]
    fn format_preserved_item_shows_error() {
        let mut preserved = item("carol", ItemStatus::Preserved, Some(Tag::Raw));
        preserved.error = Some("encoder failed: boom".to_string());
        let lines = format_batch_item(3, &preserved);
        assert_eq!(lines[0], "003 carol");
        assert_eq!(lines[1], "    RAW: preserved");
        assert_eq!(lines[3], "    Error: encoder failed: boom");
    }

    #[test]
    fn format_rejected_item() {
        let mut rejected = item("bob", ItemStatus::Rejected, None);
        rejected.error = Some("unrecognized image format".to_string());
        assert_eq!(
            format_batch_item(2, &rejected),
            vec!["002 bob", "    rejected: unrecognized image format"]
        );
    }

    #[test]
    fn format_summary_lists_nonzero_counts() {
        let report = BatchReport {
            items: vec![
                item("a", ItemStatus::Encoded, Some(Tag::Base85)),
                item("b", ItemStatus::Encoded, Some(Tag::LzDict)),
                item("c", ItemStatus::Rejected, None),
            ],
            batches: 1,
        };
        assert_eq!(
            format_batch_summary(&report),
            "Optimized 3 images in 1 batch: 2 encoded, 1 rejected"
        );
    }

    #[test]
    fn format_empty_report() {
        let lines = format_batch_report(&BatchReport::default(), None);
        assert_eq!(lines, vec!["Optimized 0 images in 0 batches"]);
    }

    #[test]
    fn format_report_with_cache_stats() {
        let report = BatchReport {
            items: vec![item("a", ItemStatus::Cached, Some(Tag::Base85))],
            batches: 1,
        };
        let stats = CacheStats { hits: 1, misses: 0 };
        let lines = format_batch_report(&report, Some(&stats));
        assert_eq!(lines.last().unwrap(), "Cache: 1 cached, 0 encoded (1 total)");
        assert_eq!(lines[lines.len() - 3], "");
    }

    // =========================================================================
    // Inspect formatting tests
    // =========================================================================

    #[test]
    fn format_inspect_decoded() {
        let envelope = EncodedEnvelope::new("data:image/png;base64", Tag::Base85, "0123456789");
        let lines = format_inspect(&envelope, &Ok(vec![0; 8]));
        assert_eq!(
            lines,
            vec![
                "Header: data:image/png;base64",
                "Tag: BASE85",
                "Payload: 10 chars",
                "Decoded: 8 bytes",
            ]
        );
    }

    #[test]
    fn format_inspect_failure() {
        let envelope = EncodedEnvelope::new("", Tag::LzDict, "");
        let decoded = Err(DecodeError {
            tag: Tag::LzDict,
            source: CodecError::Truncated,
        });
        let lines = format_inspect(&envelope, &decoded);
        assert_eq!(lines[0], "Header: (none)");
        assert_eq!(
            lines[3],
            "Decoded: failed (stream ended before the end-of-stream code)"
        );
    }
}
