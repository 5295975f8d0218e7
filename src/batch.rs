//! Batch loop: songs → playlists.
//!
//! Songs are split into fixed-size batches, one playlist per batch. Each row
//! runs search → rank → select → insert. A service error on any step is
//! confined to its row: the songs not yet added (across the whole input) are
//! checkpointed and the loop moves on. A per-error checkpoint that cannot be
//! written is logged and counted; the final checkpoint is always attempted.

use anyhow::Result;
use rustc_hash::FxHashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointLabel, CheckpointSink};
use crate::client::{ServiceError, VideoService};
use crate::models::{MatchingStats, PriorityTier, SongRequest};
use crate::progress::{create_progress_bar, log_progress};
use crate::quota::{preflight, QuotaEstimate, DAILY_QUOTA_LIMIT};
use crate::scoring::{rank_candidates, select_top_candidate};

/// Maximum number of videos per playlist
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Search results requested per song
pub const DEFAULT_MAX_RESULTS: u32 = 5;

const LOG_INTERVAL: u64 = 50;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_results: u32,
    pub daily_quota_limit: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
            daily_quota_limit: DAILY_QUOTA_LIMIT,
        }
    }
}

/// Progress of the run: current batch and every id added so far.
#[derive(Debug, Default)]
pub struct BatchState {
    pub batch_index: usize,
    added_ids: FxHashSet<String>,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_added(&mut self, id: &str) {
        self.added_ids.insert(id.to_string());
    }

    pub fn is_added(&self, id: &str) -> bool {
        self.added_ids.contains(id)
    }

    pub fn added_count(&self) -> usize {
        self.added_ids.len()
    }

    /// Every song of the full input whose id has not been added, in input order.
    pub fn remaining<'a>(&self, songs: &'a [SongRequest]) -> Vec<&'a SongRequest> {
        songs.iter().filter(|s| !self.is_added(&s.id)).collect()
    }
}

/// Result of processing one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Added { video_id: String, tier: PriorityTier },
    NoMatch,
}

#[derive(Debug)]
pub struct RunSummary {
    pub estimate: QuotaEstimate,
    pub batches: usize,
    /// Ids never added, as written to the final checkpoint
    pub missed: Vec<String>,
    pub stats: MatchingStats,
}

/// Search → rank → select → insert for one song.
pub fn process_row<S: VideoService + ?Sized>(
    service: &mut S,
    song: &SongRequest,
    playlist_id: &str,
    config: &BatchConfig,
    stats: &mut MatchingStats,
) -> Result<RowOutcome, ServiceError> {
    let results = service.search(&song.query(), config.max_results)?;
    let candidates = rank_candidates(service, song, &results, stats)?;

    let Some(top) = select_top_candidate(&candidates) else {
        return Ok(RowOutcome::NoMatch);
    };
    service.insert_video(&top.video_id, playlist_id)?;
    Ok(RowOutcome::Added {
        video_id: top.video_id.clone(),
        tier: top.tier,
    })
}

fn checkpoint<C: CheckpointSink + ?Sized>(
    sink: &mut C,
    label: CheckpointLabel,
    state: &BatchState,
    songs: &[SongRequest],
    stats: &mut MatchingStats,
) -> Result<()> {
    sink.write(label, &state.remaining(songs))?;
    stats.checkpoints_written += 1;
    Ok(())
}

/// Per-error checkpoint. Failing to write it must not stop the row loop.
fn error_checkpoint<C: CheckpointSink + ?Sized>(
    sink: &mut C,
    label: CheckpointLabel,
    state: &BatchState,
    songs: &[SongRequest],
    stats: &mut MatchingStats,
) {
    if let Err(e) = checkpoint(sink, label, state, songs, stats) {
        warn!("Could not write checkpoint {}: {:#}", label.file_name(), e);
        stats.checkpoint_failures += 1;
    }
}

/// Run every batch. Fails only on the quota pre-flight or when the final
/// checkpoint cannot be persisted; service errors are absorbed per row.
pub fn run_batches<S, C>(
    service: &mut S,
    sink: &mut C,
    songs: &[SongRequest],
    config: &BatchConfig,
) -> Result<RunSummary>
where
    S: VideoService + ?Sized,
    C: CheckpointSink + ?Sized,
{
    let estimate = preflight(songs.len(), config.batch_size, config.daily_quota_limit)?;
    info!("Estimated quota usage is {} units", estimate.cost);

    let start = Instant::now();
    let mut stats = MatchingStats {
        total_songs: songs.len(),
        ..Default::default()
    };
    let mut state = BatchState::new();
    let total = songs.len() as u64;
    let pb = create_progress_bar(total, "Matching songs");
    let mut done: u64 = 0;
    let mut batches = 0;

    for (batch_index, batch) in songs.chunks(config.batch_size.max(1)).enumerate() {
        state.batch_index = batch_index;
        batches += 1;
        let first_row = batch_index * config.batch_size.max(1);

        let playlist_id = match service.create_playlist(batch_index) {
            Ok(id) => {
                stats.playlists_created += 1;
                info!("Batch {}: created playlist {} for {} songs", batch_index, id, batch.len());
                id
            }
            Err(e) => {
                warn!("Batch {}: playlist creation failed, skipping batch: {}", batch_index, e);
                stats.playlist_failures += 1;
                stats.songs_failed += batch.len();
                error_checkpoint(
                    sink,
                    CheckpointLabel::Error {
                        batch: batch_index,
                        row: first_row,
                    },
                    &state,
                    songs,
                    &mut stats,
                );
                done += batch.len() as u64;
                pb.inc(batch.len() as u64);
                continue;
            }
        };

        for (offset, song) in batch.iter().enumerate() {
            let row = first_row + offset;
            match process_row(service, song, &playlist_id, config, &mut stats) {
                Ok(RowOutcome::Added { video_id, tier }) => {
                    state.mark_added(&song.id);
                    stats.songs_added += 1;
                    debug!(
                        "Row {}: added {} (tier {}) for '{}'",
                        row,
                        video_id,
                        tier.rank(),
                        song.query()
                    );
                }
                Ok(RowOutcome::NoMatch) => {
                    stats.songs_no_match += 1;
                    debug!("Row {}: no match for '{}'", row, song.query());
                }
                Err(e) => {
                    warn!("Batch {} row {}: service error for '{}': {}", batch_index, row, song.query(), e);
                    stats.songs_failed += 1;
                    error_checkpoint(
                        sink,
                        CheckpointLabel::Error {
                            batch: batch_index,
                            row,
                        },
                        &state,
                        songs,
                        &mut stats,
                    );
                }
            }
            done += 1;
            pb.inc(1);
            log_progress("match", done, total, LOG_INTERVAL);
        }
    }
    pb.finish_with_message(format!("Added {} of {} songs", stats.songs_added, songs.len()));

    checkpoint(sink, CheckpointLabel::Final, &state, songs, &mut stats)?;
    let missed = state
        .remaining(songs)
        .into_iter()
        .map(|s| s.id.clone())
        .collect();

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(RunSummary {
        estimate,
        batches,
        missed,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpoints;
    use crate::client::ScriptedService;
    use crate::models::{RawSearchResult, ResultKind};
    use crate::quota::QuotaExceeded;

    fn songs(n: usize) -> Vec<SongRequest> {
        (0..n)
            .map(|i| SongRequest {
                row: i,
                id: format!("id{}", i),
                artist: format!("Artist {}", i),
                song: format!("Song {}", i),
            })
            .collect()
    }

    /// Every song gets one tier-3 hit with a valid duration
    fn matching_service(songs: &[SongRequest]) -> ScriptedService {
        let mut service = ScriptedService::new();
        for s in songs {
            let video_id = format!("v{}", s.row);
            service = service
                .with_search(
                    &s.query(),
                    vec![RawSearchResult {
                        kind: ResultKind::Video,
                        video_id: video_id.clone(),
                        title: format!("{} - {} (Official Video)", s.artist, s.song),
                        channel_title: "someuploader".to_string(),
                        description: String::new(),
                    }],
                )
                .with_duration(&video_id, "PT3M30S");
        }
        service
    }

    #[test]
    fn test_all_rows_added() {
        let input = songs(3);
        let mut service = matching_service(&input);
        let mut sink = MemoryCheckpoints::default();
        let summary = run_batches(&mut service, &mut sink, &input, &BatchConfig::default()).unwrap();

        assert_eq!(summary.batches, 1);
        assert_eq!(summary.stats.songs_added, 3);
        assert!(summary.missed.is_empty());
        assert_eq!(service.inserted.len(), 3);
        assert_eq!(sink.written.len(), 1);
        assert_eq!(sink.get(CheckpointLabel::Final), Some(&[][..]));
    }

    #[test]
    fn test_insert_failure_checkpoints_whole_input_and_continues() {
        let input = songs(250);
        let mut service = matching_service(&input).fail_insert_call(5);
        let mut sink = MemoryCheckpoints::default();
        let summary = run_batches(&mut service, &mut sink, &input, &BatchConfig::default()).unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(service.playlists.len(), 2);

        let ids = sink
            .get(CheckpointLabel::Error { batch: 0, row: 5 })
            .unwrap();
        assert_eq!(ids.len(), 245);
        assert_eq!(ids[0], "id5");
        assert_eq!(ids[244], "id249");

        // Batch 0 kept going through its last row, batch 1 got the remaining 50
        let in_first = service.inserted.iter().filter(|(_, p)| p == "PL0").count();
        let in_second = service.inserted.iter().filter(|(_, p)| p == "PL1").count();
        assert_eq!(in_first, 199);
        assert_eq!(in_second, 50);
        assert!(service.inserted.iter().any(|(v, _)| v == "v199"));

        assert_eq!(sink.get(CheckpointLabel::Final), Some(&["id5".to_string()][..]));
        assert_eq!(summary.missed, vec!["id5".to_string()]);
        assert_eq!(summary.stats.songs_failed, 1);
        assert_eq!(summary.stats.checkpoints_written, 2);
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let input = songs(2);
        // Second song has no search results
        let mut service = matching_service(&input[..1]);
        let mut sink = MemoryCheckpoints::default();
        let summary = run_batches(&mut service, &mut sink, &input, &BatchConfig::default()).unwrap();

        assert_eq!(summary.stats.songs_added, 1);
        assert_eq!(summary.stats.songs_no_match, 1);
        assert_eq!(sink.written.len(), 1);
        assert_eq!(summary.missed, vec!["id1".to_string()]);
    }

    #[test]
    fn test_search_failure_is_row_scoped() {
        let input = songs(3);
        let mut service = matching_service(&input).fail_search(&input[1].query());
        let mut sink = MemoryCheckpoints::default();
        let summary = run_batches(&mut service, &mut sink, &input, &BatchConfig::default()).unwrap();

        assert_eq!(summary.stats.songs_added, 2);
        let ids = sink
            .get(CheckpointLabel::Error { batch: 0, row: 1 })
            .unwrap();
        assert_eq!(ids, &["id1".to_string(), "id2".to_string()][..]);
        assert_eq!(summary.missed, vec!["id1".to_string()]);
    }

    #[test]
    fn test_duration_failure_is_row_scoped() {
        let input = songs(3);
        // Row 1 has a hit whose duration lookup fails
        let mut service = matching_service(&[input[0].clone(), input[2].clone()]).with_search(
            &input[1].query(),
            vec![RawSearchResult {
                kind: ResultKind::Video,
                video_id: "v1".to_string(),
                title: "Artist 1 - Song 1".to_string(),
                channel_title: "someuploader".to_string(),
                description: String::new(),
            }],
        );
        let mut sink = MemoryCheckpoints::default();
        let summary = run_batches(&mut service, &mut sink, &input, &BatchConfig::default()).unwrap();

        let ids = sink
            .get(CheckpointLabel::Error { batch: 0, row: 1 })
            .unwrap();
        assert_eq!(ids, &["id1".to_string(), "id2".to_string()][..]);
        let inserted: Vec<&str> = service.inserted.iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(inserted, vec!["v0", "v2"]);
        assert_eq!(summary.stats.songs_failed, 1);
        assert_eq!(summary.missed, vec!["id1".to_string()]);
    }

    #[test]
    fn test_unwritable_error_checkpoint_does_not_stop_run() {
        use crate::checkpoint::CsvCheckpointWriter;
        use crate::table::{encoding_for_label, SongTable};

        // Resuming from a per-error checkpoint inside the checkpoint directory:
        // a new error at the same (batch, row) would overwrite the input.
        let dir = tempfile::tempdir().unwrap();
        let text = "ID,Artist,Song\n1,Artist 0,Song 0\n2,Artist 1,Song 1\n3,Artist 2,Song 2\n";
        let input_path = dir.path().join("MissedSongs_0_1.csv");
        std::fs::write(&input_path, text).unwrap();
        let table = SongTable::parse(text).unwrap();
        let encoding = encoding_for_label("utf-8").unwrap();
        let mut writer = CsvCheckpointWriter::new(&table, dir.path(), &input_path, encoding);
        let mut service = matching_service(&table.songs).fail_insert_call(1);

        let summary =
            run_batches(&mut service, &mut writer, &table.songs, &BatchConfig::default()).unwrap();

        let inserted: Vec<&str> = service.inserted.iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(inserted, vec!["v0", "v2"]);
        assert_eq!(summary.stats.checkpoint_failures, 1);
        assert_eq!(summary.stats.checkpoints_written, 1);
        assert_eq!(std::fs::read_to_string(&input_path).unwrap(), text);
        let last = std::fs::read_to_string(dir.path().join("MissedSongs_Final.csv")).unwrap();
        assert_eq!(last, "ID,Artist,Song\n2,Artist 1,Song 1\n");
    }

    #[test]
    fn test_playlist_failure_skips_batch() {
        let input = songs(5);
        let config = BatchConfig {
            batch_size: 2,
            ..Default::default()
        };
        let mut service = matching_service(&input).fail_playlist(1);
        let mut sink = MemoryCheckpoints::default();
        let summary = run_batches(&mut service, &mut sink, &input, &config).unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(summary.stats.playlist_failures, 1);
        assert!(sink
            .get(CheckpointLabel::Error { batch: 1, row: 2 })
            .is_some());
        assert_eq!(summary.missed, vec!["id2".to_string(), "id3".to_string()]);
        assert!(!service.calls.iter().any(|c| c == "search:Artist 2 Song 2"));
    }

    #[test]
    fn test_quota_exceeded_makes_no_calls() {
        let input = songs(10);
        let config = BatchConfig {
            daily_quota_limit: 100,
            ..Default::default()
        };
        let mut service = matching_service(&input);
        let mut sink = MemoryCheckpoints::default();
        let err = run_batches(&mut service, &mut sink, &input, &config).unwrap_err();

        assert!(err.downcast_ref::<QuotaExceeded>().is_some());
        assert!(service.calls.is_empty());
        assert!(sink.written.is_empty());
    }

    #[test]
    fn test_csv_checkpoints_on_disk() {
        use crate::checkpoint::CsvCheckpointWriter;
        use crate::table::{encoding_for_label, SongTable};

        let dir = tempfile::tempdir().unwrap();
        let table = SongTable::parse(
            "ID,Artist,Song,Notes\n1,Artist 0,Song 0,a\n2,Artist 1,Song 1,b\n3,Artist 2,Song 2,c\n",
        )
        .unwrap();
        let mut service = matching_service(&table.songs).fail_insert_call(1);
        let encoding = encoding_for_label("utf-8").unwrap();
        let mut writer = CsvCheckpointWriter::new(
            &table,
            dir.path(),
            dir.path().join("SongsToAdd.csv"),
            encoding,
        );
        run_batches(&mut service, &mut writer, &table.songs, &BatchConfig::default()).unwrap();

        let on_error = std::fs::read_to_string(dir.path().join("MissedSongs_0_1.csv")).unwrap();
        assert_eq!(on_error, "ID,Artist,Song,Notes\n2,Artist 1,Song 1,b\n3,Artist 2,Song 2,c\n");
        let last = std::fs::read_to_string(dir.path().join("MissedSongs_Final.csv")).unwrap();
        assert_eq!(last, "ID,Artist,Song,Notes\n2,Artist 1,Song 1,b\n");
    }

    #[test]
    fn test_batch_state_remaining() {
        let input = songs(4);
        let mut state = BatchState::new();
        state.mark_added("id0");
        state.mark_added("id2");
        let remaining: Vec<&str> = state.remaining(&input).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(remaining, vec!["id1", "id3"]);
        assert_eq!(state.added_count(), 2);
    }
}
