//! Ranking rules for video search results.
//!
//! This module contains:
//! - Irrelevance patterns (rehearsals, covers, playthroughs)
//! - Channel classification (official / auto-generated provider uploads)
//! - Priority-tier assignment for one search result
//! - Ranking of a whole result set and top-candidate selection
//!
//! All rules are fixed heuristics. Nothing here keeps state between calls.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::client::{ServiceError, VideoService};
use crate::models::{
    Candidate, MatchingStats, NameVariants, PriorityTier, RawSearchResult, RejectReason,
    ResultKind, SongRequest,
};
use crate::normalize::{name_fuzzy_match, name_variations, parse_video_length};

// ============================================================================
// Thresholds
// ============================================================================

/// Longest accepted video, in whole minutes (hour component must be absent)
pub const MAX_VIDEO_MINUTES: u32 = 20;

/// Phrase found in descriptions of auto-generated provider uploads
pub const PROVIDER_PHRASE: &str = "provided to youtube";

// ============================================================================
// Regex Patterns
// ============================================================================

/// Title patterns that mark a video as irrelevant (checked in order).
pub static IRRELEVANT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)rehearsal").unwrap(),
        Regex::new(r"(?i)behind the scenes").unwrap(),
        // Instrument videos: "guitar cover", "drum playthrough", "bass tab"
        Regex::new(r"(?i)(guitar|drum|bass) (cover|playthrough|tab)").unwrap(),
        // Trailing "(live)" / "(cover)"
        Regex::new(r"(?i)\((live|cover)\)$").unwrap(),
    ]
});

/// Channel title words that indicate an artist or label channel
pub static OFFICIAL_CHANNEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)band|official|VEVO|records").unwrap());

// ============================================================================
// Pattern Matching Helpers
// ============================================================================

pub fn is_irrelevant(title: &str) -> bool {
    IRRELEVANT_PATTERNS.iter().any(|p| p.is_match(title))
}

/// Official if the channel title carries an authority word or is exactly
/// one of the artist's name variants.
pub fn is_official_channel(channel_title: &str, artist_variants: &NameVariants) -> bool {
    OFFICIAL_CHANNEL.is_match(channel_title) || artist_variants.contains(channel_title)
}

/// Auto-generated provider upload: artist in description, song in title,
/// and the provider phrase in description. All three must hold.
pub fn is_auto_channel(
    artist_variants: &NameVariants,
    song_variants: &NameVariants,
    title: &str,
    description: &str,
) -> bool {
    name_fuzzy_match(artist_variants, description)
        && name_fuzzy_match(song_variants, title)
        && description.to_lowercase().contains(PROVIDER_PHRASE)
}

// ============================================================================
// Tier Assignment
// ============================================================================

/// Lower-cased view of one search hit plus the name variants it is judged against.
pub struct TierInput<'a> {
    pub artist: &'a NameVariants,
    pub song: &'a NameVariants,
    pub title: &'a str,
    pub channel_title: &'a str,
    pub description: &'a str,
}

/// Assign a tier to a hit that already passed the relevance and length checks.
pub fn assign_tier(input: &TierInput<'_>) -> Option<PriorityTier> {
    if is_auto_channel(input.artist, input.song, input.title, input.description) {
        return Some(PriorityTier::AutoGenerated);
    }

    let artist_match = name_fuzzy_match(input.artist, input.title);
    let song_match = name_fuzzy_match(input.song, input.title);
    if !(artist_match && song_match) {
        return None;
    }

    if is_official_channel(input.channel_title, input.artist) {
        Some(PriorityTier::OfficialChannel)
    } else {
        Some(PriorityTier::NameMatch)
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// Judge one search hit. The duration is fetched only for hits that survive
/// the kind and title checks.
pub fn classify_result<S: VideoService + ?Sized>(
    service: &mut S,
    artist: &NameVariants,
    song: &NameVariants,
    result: &RawSearchResult,
) -> Result<Result<Candidate, RejectReason>, ServiceError> {
    if result.kind != ResultKind::Video || result.video_id.is_empty() {
        return Ok(Err(RejectReason::NotVideo));
    }

    let title = result.title.to_lowercase();
    let channel_title = result.channel_title.to_lowercase();
    let description = result.description.to_lowercase();

    if is_irrelevant(&title) {
        return Ok(Err(RejectReason::Irrelevant));
    }

    let raw_length = service.fetch_duration(&result.video_id)?;
    let Some(length) = parse_video_length(&raw_length) else {
        return Ok(Err(RejectReason::UnparsableDuration));
    };
    if length.hours.is_some() || length.minutes > MAX_VIDEO_MINUTES {
        return Ok(Err(RejectReason::TooLong));
    }

    let input = TierInput {
        artist,
        song,
        title: &title,
        channel_title: &channel_title,
        description: &description,
    };
    match assign_tier(&input) {
        Some(tier) => Ok(Ok(Candidate {
            video_id: result.video_id.clone(),
            title,
            tier,
        })),
        None => Ok(Err(RejectReason::NoNameMatch)),
    }
}

/// Rank a song's search results. Candidates keep the service's result order.
/// A service error while fetching a duration aborts ranking for this song.
pub fn rank_candidates<S: VideoService + ?Sized>(
    service: &mut S,
    request: &SongRequest,
    results: &[RawSearchResult],
    stats: &mut MatchingStats,
) -> Result<Vec<Candidate>, ServiceError> {
    let artist = name_variations(&request.artist);
    let song = name_variations(&request.song);

    let mut candidates = Vec::new();
    for result in results {
        stats.results_seen += 1;
        match classify_result(service, &artist, &song, result)? {
            Ok(candidate) => {
                stats.record_candidate(candidate.tier);
                candidates.push(candidate);
            }
            Err(reason) => {
                debug!(
                    "Rejected {:?} for '{}': {}",
                    result.video_id,
                    request.query(),
                    reason.as_str()
                );
                stats.record_rejection(reason);
            }
        }
    }
    Ok(candidates)
}

/// Best candidate: first tier-1 hit in result order, else first tier-2, else first tier-3.
pub fn select_top_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    PriorityTier::ALL
        .iter()
        .find_map(|tier| candidates.iter().find(|c| c.tier == *tier))
}

// ============================================================================
// TESTS
// ============================================================================
