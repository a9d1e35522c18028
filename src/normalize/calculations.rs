//! Pure calculation functions for output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions that fit `source` within a `target` longer edge.
///
/// Aspect ratio is preserved and images are never upscaled: a source whose
/// longer edge is already within `target` is returned unchanged.
///
/// # Examples
/// ```
/// # use avatar_codec::normalize::calculate_fit_dimensions;
/// // 1000x500 landscape into 256 → 256x128
/// assert_eq!(calculate_fit_dimensions((1000, 500), 256), (256, 128));
///
/// // Already small enough
/// assert_eq!(calculate_fit_dimensions((100, 80), 256), (100, 80));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let longer_edge = src_w.max(src_h);
    if longer_edge <= target {
        return source;
    }

    let ratio = target as f64 / longer_edge as f64;
    if src_w >= src_h {
        // Landscape or square
        (target, scale_edge(src_h, ratio))
    } else {
        // Portrait
        (scale_edge(src_w, ratio), target)
    }
}

/// Side length of the square crop for `source`.
///
/// The square is `target` pixels unless the source's short edge is smaller,
/// in which case the short edge is used so nothing is upscaled.
pub fn calculate_square_side(source: (u32, u32), target: u32) -> u32 {
    let (src_w, src_h) = source;
    src_w.min(src_h).min(target)
}

fn scale_edge(edge: u32, ratio: f64) -> u32 {
    ((edge as f64 * ratio).round() as u32).max(1)
}
