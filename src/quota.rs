//! Quota estimation for the video service.
//!
//! Costs are in the service's abstract units. The estimate is made once,
//! before any call, from the size of the workload.

use thiserror::Error;

/// Daily quota ceiling
pub const DAILY_QUOTA_LIMIT: u64 = 1_000_000;

pub const PLAYLIST_CREATE_COST: u64 = 50;
pub const PLAYLIST_INSERT_COST: u64 = 50;
pub const VIDEO_SEARCH_COST: u64 = 100;
pub const VIDEO_INFO_COST: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaEstimate {
    pub playlists: u64,
    pub songs: u64,
    pub cost: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("estimated quota usage of {} units meets or exceeds the daily limit of {limit}", .estimate.cost)]
pub struct QuotaExceeded {
    pub estimate: QuotaEstimate,
    pub limit: u64,
}

/// Number of playlists needed for `songs` rows at `batch_size` rows each
pub fn playlist_count(songs: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    songs.div_ceil(batch_size)
}

/// Estimated cost of creating `playlists` playlists and matching/inserting `songs` songs.
pub fn quota_estimate(playlists: u64, songs: u64) -> u64 {
    let playlist_create_cost = PLAYLIST_CREATE_COST * playlists;
    let playlist_insert_cost = PLAYLIST_INSERT_COST * songs;
    let video_search_cost = VIDEO_SEARCH_COST * songs;
    let video_info_cost = VIDEO_INFO_COST * songs;
    playlist_create_cost + playlist_insert_cost + video_search_cost + video_info_cost
}

/// Estimate the whole run and refuse it when it would reach `limit`.
pub fn preflight(songs: usize, batch_size: usize, limit: u64) -> Result<QuotaEstimate, QuotaExceeded> {
    let playlists = playlist_count(songs, batch_size) as u64;
    let songs = songs as u64;
    let estimate = QuotaEstimate {
        playlists,
        songs,
        cost: quota_estimate(playlists, songs),
    };
    if estimate.cost >= limit {
        return Err(QuotaExceeded { estimate, limit });
    }
    Ok(estimate)
}
