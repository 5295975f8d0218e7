//! YouTube Data API v3 backend for [`VideoService`].
//!
//! Blocking calls through a `ureq` agent. Authorization is a bearer access
//! token obtained elsewhere; this module never runs an OAuth flow.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::client::{ServiceError, VideoService};
use crate::models::{RawSearchResult, ResultKind};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const PLAYLIST_DESCRIPTION: &str = "A music playlist created with the YouTube API v3";

/// Playlist naming and visibility.
#[derive(Debug, Clone)]
pub struct PlaylistSettings {
    /// Title template; `{index}` is replaced by the batch index
    pub title_template: String,
    pub privacy: String,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            title_template: "Playlist {index} v4".to_string(),
            privacy: "public".to_string(),
        }
    }
}

impl PlaylistSettings {
    pub fn title(&self, index: usize) -> String {
        self.title_template.replace("{index}", &index.to_string())
    }
}

// ============================================================================
// Response Shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    kind: String,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    id: String,
}

impl From<SearchItem> for RawSearchResult {
    fn from(item: SearchItem) -> Self {
        RawSearchResult {
            kind: ResultKind::from(item.id.kind.as_str()),
            video_id: item.id.video_id.unwrap_or_default(),
            title: item.snippet.title,
            channel_title: item.snippet.channel_title,
            description: item.snippet.description,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated YouTube client.
pub struct YouTubeClient {
    http_client: ureq::Agent,
    api_base: String,
    access_token: String,
    playlists: PlaylistSettings,
}

impl YouTubeClient {
    pub fn new(api_base: &str, access_token: &str, playlists: PlaylistSettings) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .timeout_write(Duration::from_secs(30))
            .build();
        Self {
            http_client,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            playlists,
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.api_base, resource)
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn get(&self, resource: &str) -> ureq::Request {
        self.http_client
            .get(&self.url(resource))
            .set("Authorization", &self.authorization())
            .set("Accept", "application/json")
    }

    fn post(&self, resource: &str) -> ureq::Request {
        self.http_client
            .post(&self.url(resource))
            .set("Authorization", &self.authorization())
            .set("Accept", "application/json")
    }
}

fn classify_ureq_failure(error: ureq::Error) -> ServiceError {
    match error {
        ureq::Error::Status(status, response) => ServiceError::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => ServiceError::Transport(transport.to_string()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, ServiceError> {
    response
        .into_json()
        .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

impl VideoService for YouTubeClient {
    fn search(
        &mut self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<RawSearchResult>, ServiceError> {
        let response = self
            .get("search")
            .query("part", "id,snippet")
            .query("q", query)
            .query("maxResults", &max_results.to_string())
            .call()
            .map_err(classify_ureq_failure)?;
        let body: SearchResponse = read_json(response)?;
        Ok(body.items.into_iter().map(RawSearchResult::from).collect())
    }

    fn fetch_duration(&mut self, video_id: &str) -> Result<String, ServiceError> {
        let response = self
            .get("videos")
            .query("part", "contentDetails")
            .query("id", video_id)
            .call()
            .map_err(classify_ureq_failure)?;
        let body: VideoListResponse = read_json(response)?;
        body.items
            .into_iter()
            .next()
            .map(|item| item.content_details.duration)
            .ok_or_else(|| ServiceError::VideoNotFound(video_id.to_string()))
    }

    fn create_playlist(&mut self, index: usize) -> Result<String, ServiceError> {
        let response = self
            .post("playlists")
            .query("part", "snippet,status")
            .send_json(json!({
                "snippet": {
                    "title": self.playlists.title(index),
                    "description": PLAYLIST_DESCRIPTION,
                },
                "status": {
                    "privacyStatus": self.playlists.privacy,
                },
            }))
            .map_err(classify_ureq_failure)?;
        let body: PlaylistResponse = read_json(response)?;
        Ok(body.id)
    }

    fn insert_video(&mut self, video_id: &str, playlist_id: &str) -> Result<(), ServiceError> {
        self.post("playlistItems")
            .query("part", "snippet")
            .send_json(json!({
                "snippet": {
                    "playlistId": playlist_id,
                    "resourceId": {
                        "kind": "youtube#video",
                        "videoId": video_id,
                    },
                },
            }))
            .map_err(classify_ureq_failure)?;
        Ok(())
    }
}
