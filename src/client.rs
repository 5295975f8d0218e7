//! Video service boundary.
//!
//! The batch loop and the ranker only talk to the remote service through
//! [`VideoService`]. [`ScriptedService`] is an in-memory implementation that
//! replays canned responses; it backs the tests and the `simulate` binary.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::models::RawSearchResult;

/// Errors reported by the remote video service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Non-success HTTP status.
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// Metadata lookup returned no item for the id.
    #[error("Video not found: {0}")]
    VideoNotFound(String),
}

/// Blocking operations the matcher needs from the remote service.
pub trait VideoService {
    /// Search by free text. May return fewer than `max_results` hits and non-video kinds.
    fn search(&mut self, query: &str, max_results: u32)
        -> Result<Vec<RawSearchResult>, ServiceError>;

    /// Compact ISO-8601 duration string for a video (e.g. `PT3M45S`).
    fn fetch_duration(&mut self, video_id: &str) -> Result<String, ServiceError>;

    /// Create the destination playlist for batch `index`, returning its id.
    fn create_playlist(&mut self, index: usize) -> Result<String, ServiceError>;

    /// Append a video to a playlist.
    fn insert_video(&mut self, video_id: &str, playlist_id: &str) -> Result<(), ServiceError>;
}

// ============================================================================
// Scripted Service
// ============================================================================

/// Deterministic in-memory service.
///
/// Unknown queries return no hits; unknown video ids fail with
/// [`ServiceError::VideoNotFound`]. Failures are scripted per query, per
/// video id, per playlist index or per insert call ordinal (zero-based).
#[derive(Debug, Default)]
pub struct ScriptedService {
    searches: FxHashMap<String, Vec<RawSearchResult>>,
    durations: FxHashMap<String, String>,
    failing_searches: FxHashSet<String>,
    failing_playlists: FxHashSet<usize>,
    failing_insert_calls: FxHashSet<usize>,

    /// Every call made, in order, e.g. `search:Tool Sober`
    pub calls: Vec<String>,
    /// Playlists created, as (index, id)
    pub playlists: Vec<(usize, String)>,
    /// Successful inserts, as (video_id, playlist_id)
    pub inserted: Vec<(String, String)>,
    insert_calls: usize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, results: Vec<RawSearchResult>) -> Self {
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn with_duration(mut self, video_id: &str, duration: &str) -> Self {
        self.durations
            .insert(video_id.to_string(), duration.to_string());
        self
    }

    pub fn fail_search(mut self, query: &str) -> Self {
        self.failing_searches.insert(query.to_string());
        self
    }

    pub fn fail_playlist(mut self, index: usize) -> Self {
        self.failing_playlists.insert(index);
        self
    }

    pub fn fail_insert_call(mut self, ordinal: usize) -> Self {
        self.failing_insert_calls.insert(ordinal);
        self
    }

    fn scripted_error(what: &str) -> ServiceError {
        ServiceError::Status {
            status: 500,
            body: format!("scripted failure: {}", what),
        }
    }
}

impl VideoService for ScriptedService {
    fn search(
        &mut self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<RawSearchResult>, ServiceError> {
        self.calls.push(format!("search:{}", query));
        if self.failing_searches.contains(query) {
            return Err(Self::scripted_error(query));
        }
        Ok(self
            .searches
            .get(query)
            .map(|r| r.iter().take(max_results as usize).cloned().collect())
            .unwrap_or_default())
    }

    fn fetch_duration(&mut self, video_id: &str) -> Result<String, ServiceError> {
        self.calls.push(format!("duration:{}", video_id));
        self.durations
            .get(video_id)
            .cloned()
            .ok_or_else(|| ServiceError::VideoNotFound(video_id.to_string()))
    }

    fn create_playlist(&mut self, index: usize) -> Result<String, ServiceError> {
        self.calls.push(format!("playlist:{}", index));
        if self.failing_playlists.contains(&index) {
            return Err(Self::scripted_error("create playlist"));
        }
        let id = format!("PL{}", index);
        self.playlists.push((index, id.clone()));
        Ok(id)
    }

    fn insert_video(&mut self, video_id: &str, playlist_id: &str) -> Result<(), ServiceError> {
        self.calls.push(format!("insert:{}", video_id));
        let ordinal = self.insert_calls;
        self.insert_calls += 1;
        if self.failing_insert_calls.contains(&ordinal) {
            return Err(Self::scripted_error("insert"));
        }
        self.inserted
            .push((video_id.to_string(), playlist_id.to_string()));
        Ok(())
    }
}
