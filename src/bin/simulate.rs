//! Replay saved search results through the ranking rules.
//! Usage: cargo run --release --bin simulate -- <fixture.json>
//!
//! Fixture format:
//! {"songs": [{"artist": "...", "song": "...", "results": [
//!     {"kind": "video", "videoId": "...", "title": "...", "channelTitle": "...",
//!      "description": "...", "duration": "PT3M45S"}]}]}

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use playlist_match::client::ScriptedService;
use playlist_match::models::{MatchingStats, RawSearchResult, SongRequest};
use playlist_match::scoring::{rank_candidates, select_top_candidate};

#[derive(Parser)]
#[command(name = "simulate")]
#[command(about = "Replay saved search results through the ranking rules")]
struct Args {
    fixture: PathBuf,

    /// Search results inspected per song
    #[arg(long, default_value_t = 5)]
    max_results: usize,

    /// Write matching statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    songs: Vec<FixtureSong>,
}

#[derive(Debug, Deserialize)]
struct FixtureSong {
    #[serde(default)]
    id: Option<String>,
    artist: String,
    song: String,
    #[serde(default)]
    results: Vec<FixtureResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureResult {
    #[serde(flatten)]
    result: RawSearchResult,
    /// Missing durations replay as a metadata lookup failure
    #[serde(default)]
    duration: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("Failed to read fixture {}", args.fixture.display()))?;
    let fixture: Fixture = serde_json::from_str(&text).context("Invalid fixture JSON")?;

    let mut stats = MatchingStats {
        total_songs: fixture.songs.len(),
        ..Default::default()
    };
    let mut errors = 0usize;

    println!("\n=== SIMULATION RESULTS ===\n");
    for (row, entry) in fixture.songs.into_iter().enumerate() {
        let request = SongRequest {
            row,
            id: entry.id.unwrap_or_else(|| row.to_string()),
            artist: entry.artist,
            song: entry.song,
        };

        let mut service = ScriptedService::new();
        let mut results = Vec::with_capacity(entry.results.len());
        for r in entry.results.into_iter().take(args.max_results) {
            if let Some(duration) = &r.duration {
                service = service.with_duration(&r.result.video_id, duration);
            }
            results.push(r.result);
        }

        println!("[{}] {}", request.id, request.query());
        match rank_candidates(&mut service, &request, &results, &mut stats) {
            Ok(candidates) => {
                for c in &candidates {
                    println!("  tier {}  {}  \"{}\"", c.tier.rank(), c.video_id, c.title);
                }
                match select_top_candidate(&candidates) {
                    Some(top) => {
                        stats.songs_added += 1;
                        println!("  TOP: {} (tier {})", top.video_id, top.tier.rank());
                    }
                    None => {
                        stats.songs_no_match += 1;
                        println!("  TOP: No results found");
                    }
                }
            }
            Err(e) => {
                errors += 1;
                stats.songs_failed += 1;
                println!("  ERROR: {}", e);
            }
        }
        println!();
    }

    println!("=== BREAKDOWN ===\n");
    println!("Songs:               {:>7}", stats.total_songs);
    println!("Matched:             {:>7} ({:.1}%)", stats.songs_added, stats.match_rate());
    println!("No match:            {:>7}", stats.songs_no_match);
    println!("Lookup errors:       {:>7}", errors);
    println!("Tier 1 candidates:   {:>7}", stats.tier1_candidates);
    println!("Tier 2 candidates:   {:>7}", stats.tier2_candidates);
    println!("Tier 3 candidates:   {:>7}", stats.tier3_candidates);
    println!("Rejected not video:  {:>7}", stats.rejected_not_video);
    println!("Rejected irrelevant: {:>7}", stats.rejected_irrelevant);
    println!("Rejected duration:   {:>7}", stats.rejected_unparsable_duration);
    println!("Rejected too long:   {:>7}", stats.rejected_too_long);
    println!("Rejected no name:    {:>7}", stats.rejected_no_name_match);

    if let Some(path) = &args.stats {
        stats.write_to_file(path)?;
    }

    Ok(())
}
