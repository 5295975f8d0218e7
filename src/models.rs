//! Core data models for playlist matching.
//!
//! This module contains the struct definitions and enums shared by the
//! ranking rules, the batch loop and the binaries.

use serde::{Deserialize, Serialize};

// ============================================================================
// Input Models
// ============================================================================

/// One row of the input song table.
///
/// `row` is the zero-based position in the source table. It lets checkpoint
/// writers reproduce the original record even when ids repeat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongRequest {
    pub row: usize,
    pub id: String,
    pub artist: String,
    pub song: String,
}

impl SongRequest {
    /// Free-text query sent to the search endpoint.
    pub fn query(&self) -> String {
        format!("{} {}", self.artist, self.song)
    }
}

// ============================================================================
// Search Models
// ============================================================================

/// Kind of a search hit. Only videos can become candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Video,
    #[default]
    Other,
}

impl From<&str> for ResultKind {
    fn from(s: &str) -> Self {
        match s {
            "youtube#video" | "video" => ResultKind::Video,
            _ => ResultKind::Other,
        }
    }
}

/// Search hit as returned by the video service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchResult {
    #[serde(default)]
    pub kind: ResultKind,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub description: String,
}

/// Parsed `PT[<h>H]<m>M<s>S` duration.
/// `hours` keeps the captured digits with their unit suffix (e.g. `"1h"`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoLength {
    pub hours: Option<String>,
    pub minutes: u32,
    pub seconds: u32,
}

/// Three lower-cased forms of a free-text name:
/// raw, punctuation-stripped with collapsed whitespace, and `&` spelled "and".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameVariants(pub [String; 3]);

impl NameVariants {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, s: &str) -> bool {
        self.iter().any(|v| v == s)
    }
}

// ============================================================================
// Candidate Models
// ============================================================================

/// Trust level of an accepted search hit. Lower rank is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityTier {
    /// Auto-generated upload from a content provider
    AutoGenerated,
    /// Official artist or label channel, artist and song in title
    OfficialChannel,
    /// Any channel, artist and song in title
    NameMatch,
}

impl PriorityTier {
    /// Scan order used by top-candidate selection.
    pub const ALL: [PriorityTier; 3] = [
        PriorityTier::AutoGenerated,
        PriorityTier::OfficialChannel,
        PriorityTier::NameMatch,
    ];

    /// Numeric tier: 1 = highest trust, 3 = weakest acceptable
    pub fn rank(self) -> u8 {
        match self {
            PriorityTier::AutoGenerated => 1,
            PriorityTier::OfficialChannel => 2,
            PriorityTier::NameMatch => 3,
        }
    }
}

/// Search hit accepted as a plausible match for a song.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub video_id: String,
    pub title: String,
    pub tier: PriorityTier,
}

/// Why a search hit did not become a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotVideo,
    Irrelevant,
    UnparsableDuration,
    TooLong,
    NoNameMatch,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NotVideo => "not a video",
            RejectReason::Irrelevant => "irrelevant title",
            RejectReason::UnparsableDuration => "unparsable duration",
            RejectReason::TooLong => "too long",
            RejectReason::NoNameMatch => "artist/song not in title",
        }
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Counters collected over a run. Written as JSON with `--stats`.
#[derive(Default, Debug, Clone, Serialize)]
pub struct MatchingStats {
    // Search results
    pub results_seen: usize,
    pub rejected_not_video: usize,
    pub rejected_irrelevant: usize,
    pub rejected_unparsable_duration: usize,
    pub rejected_too_long: usize,
    pub rejected_no_name_match: usize,

    // Accepted candidates by tier
    pub tier1_candidates: usize,
    pub tier2_candidates: usize,
    pub tier3_candidates: usize,

    // Rows
    pub total_songs: usize,
    pub songs_added: usize,
    pub songs_no_match: usize,
    pub songs_failed: usize,

    // Service side
    pub playlists_created: usize,
    pub playlist_failures: usize,
    pub checkpoints_written: usize,
    pub checkpoint_failures: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl MatchingStats {
    /// Percentage of input rows that ended up in a playlist
    pub fn match_rate(&self) -> f64 {
        if self.total_songs == 0 {
            0.0
        } else {
            100.0 * self.songs_added as f64 / self.total_songs as f64
        }
    }

    pub fn record_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::NotVideo => self.rejected_not_video += 1,
            RejectReason::Irrelevant => self.rejected_irrelevant += 1,
            RejectReason::UnparsableDuration => self.rejected_unparsable_duration += 1,
            RejectReason::TooLong => self.rejected_too_long += 1,
            RejectReason::NoNameMatch => self.rejected_no_name_match += 1,
        }
    }

    pub fn record_candidate(&mut self, tier: PriorityTier) {
        match tier {
            PriorityTier::AutoGenerated => self.tier1_candidates += 1,
            PriorityTier::OfficialChannel => self.tier2_candidates += 1,
            PriorityTier::NameMatch => self.tier3_candidates += 1,
        }
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_rank_order() {
        let ranks: Vec<u8> = PriorityTier::ALL.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(PriorityTier::AutoGenerated < PriorityTier::NameMatch);
    }

    #[test]
    fn test_result_kind_from_api() {
        assert_eq!(ResultKind::from("youtube#video"), ResultKind::Video);
        assert_eq!(ResultKind::from("youtube#channel"), ResultKind::Other);
        assert_eq!(ResultKind::from("youtube#playlist"), ResultKind::Other);
    }

    #[test]
    fn test_match_rate() {
        let mut stats = MatchingStats::default();
        assert_eq!(stats.match_rate(), 0.0);
        stats.total_songs = 4;
        stats.songs_added = 3;
        assert_eq!(stats.match_rate(), 75.0);
    }

    #[test]
    fn test_query_text() {
        let song = SongRequest {
            row: 0,
            id: "1".into(),
            artist: "Tool".into(),
            song: "Sober".into(),
        };
        assert_eq!(song.query(), "Tool Sober");
    }
}
