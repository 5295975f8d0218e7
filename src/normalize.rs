//! Normalization of names and durations for search-result matching.
//!
//! Name variants are compared with plain substring checks, so every form
//! here is lower-cased.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{NameVariants, VideoLength};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Everything that is neither a word character nor whitespace.
pub static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Compact ISO-8601 duration as returned by the video metadata endpoint.
/// Only minute+second durations (with optional hours) are recognised.
pub static VIDEO_LENGTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pt([0-9]+h)?([0-9]{1,2})m([0-9]{1,2})s").unwrap());

// ============================================================================
// NAME VARIANTS
// ============================================================================

/// Compute the three lower-cased variants of a name.
/// e.g., "Coheed & Cambria" → ["coheed & cambria", "coheed cambria", "coheed and cambria"]
pub fn name_variations(name: &str) -> NameVariants {
    let lower = name.to_lowercase();

    let stripped = NON_WORD.replace_all(&lower, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let with_and = lower.replace('&', "and");

    NameVariants([lower, collapsed, with_and])
}

/// Check if any non-empty variant of a name appears in `text`.
/// Unlike plain containment, an empty variant (e.g. the stripped form of `"!!!"`)
/// never counts as a match.
pub fn name_fuzzy_match(variants: &NameVariants, text: &str) -> bool {
    variants
        .iter()
        .filter(|v| !v.is_empty())
        .any(|v| text.contains(v))
}

// ============================================================================
// DURATIONS
// ============================================================================

/// Parse a `PT[<h>H]<m>M<s>S` duration. Returns None for anything else,
/// including seconds-only (`PT45S`) and hours-only (`PT1H`) values.
pub fn parse_video_length(length: &str) -> Option<VideoLength> {
    let lower = length.to_lowercase();
    let caps = VIDEO_LENGTH.captures(&lower)?;

    Some(VideoLength {
        hours: caps.get(1).map(|m| m.as_str().to_string()),
        minutes: caps.get(2)?.as_str().parse().ok()?,
        seconds: caps.get(3)?.as_str().parse().ok()?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
