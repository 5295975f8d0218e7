use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlist_match::batch::{run_batches, BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RESULTS};
use playlist_match::checkpoint::{
    is_checkpoint_file, is_checkpoint_in_dir, CheckpointLabel, CsvCheckpointWriter,
};
use playlist_match::progress::{format_duration, set_log_only};
use playlist_match::quota::{preflight, DAILY_QUOTA_LIMIT};
use playlist_match::table::{encoding_for_label, SongTable};
use playlist_match::youtube::{PlaylistSettings, YouTubeClient, DEFAULT_API_BASE};

#[derive(Parser)]
#[command(name = "playlist-match")]
#[command(about = "Match (artist, song) rows to YouTube videos and add them to playlists")]
struct Args {
    /// Song table with ID, Artist and Song columns
    #[arg(default_value = "SongsToAdd.csv")]
    input: PathBuf,

    /// Directory for MissedSongs_*.csv checkpoints
    #[arg(long, env = "PLAYLIST_MATCH_CHECKPOINT_DIR", default_value = ".")]
    checkpoint_dir: PathBuf,

    /// Videos per playlist
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    batch_size: usize,

    /// Search results inspected per song
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: u32,

    /// Daily quota ceiling in API units
    #[arg(long, default_value_t = DAILY_QUOTA_LIMIT)]
    daily_quota: u64,

    /// Text encoding of the song table and checkpoints
    #[arg(long, default_value = "iso-8859-1")]
    encoding: String,

    /// OAuth access token with the youtube.force-ssl scope
    #[arg(long, env = "YOUTUBE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "YOUTUBE_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Playlist title; {index} is replaced by the batch number
    #[arg(long, default_value = "Playlist {index} v4")]
    playlist_title: String,

    #[arg(long, default_value = "public")]
    privacy: String,

    /// Write matching statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars and log periodic progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Print the quota estimate and exit
    #[arg(long)]
    estimate_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    set_log_only(args.log_only);

    let encoding = encoding_for_label(&args.encoding)?;
    let table = SongTable::read(&args.input, encoding)?;
    if is_checkpoint_file(&args.input) {
        info!("Resuming from checkpoint {}", args.input.display());
    }
    info!("Read {} songs from {}", table.songs.len(), args.input.display());

    let estimate = match preflight(table.songs.len(), args.batch_size, args.daily_quota) {
        Ok(estimate) => estimate,
        Err(e) => {
            println!(
                "WARNING: Your quota usage is estimated to exceed your daily limit ({} >= {} units).\n\
                 Please proceed accordingly.",
                e.estimate.cost, e.limit
            );
            return Err(e.into());
        }
    };
    println!(
        "NOTE: Your estimated quota usage is {} units ({} playlists, {} songs).",
        estimate.cost, estimate.playlists, estimate.songs
    );
    if args.estimate_only {
        return Ok(());
    }

    let token = match args.access_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => bail!("Error in YouTube authentication: no access token (set YOUTUBE_ACCESS_TOKEN)"),
    };
    let mut client = YouTubeClient::new(
        &args.api_base,
        &token,
        PlaylistSettings {
            title_template: args.playlist_title.clone(),
            privacy: args.privacy.clone(),
        },
    );

    // Any checkpoint written this run could replace a resumed checkpoint in the same directory
    if is_checkpoint_in_dir(&args.input, &args.checkpoint_dir) {
        bail!(
            "Input {} is a checkpoint inside the checkpoint directory {}; pass a different --checkpoint-dir",
            args.input.display(),
            args.checkpoint_dir.display()
        );
    }
    let mut checkpoints =
        CsvCheckpointWriter::new(&table, &args.checkpoint_dir, &args.input, encoding);
    let config = BatchConfig {
        batch_size: args.batch_size,
        max_results: args.max_results,
        daily_quota_limit: args.daily_quota,
    };

    let summary = run_batches(&mut client, &mut checkpoints, &table.songs, &config)?;
    let stats = &summary.stats;

    println!("\n{:=<60}", "");
    println!("Playlist run complete!");
    println!("  Playlists: {} of {}", stats.playlists_created, summary.batches);
    println!(
        "  Added: {} of {} ({:.1}%)",
        stats.songs_added,
        stats.total_songs,
        stats.match_rate()
    );
    println!("  No match: {}", stats.songs_no_match);
    println!("  Service errors: {}", stats.songs_failed);
    println!(
        "  Missed songs: {} -> {}",
        summary.missed.len(),
        checkpoints.path_for(CheckpointLabel::Final).display()
    );
    println!(
        "  Elapsed: {}",
        format_duration(std::time::Duration::from_secs_f64(stats.elapsed_seconds))
    );
    println!("{:=<60}", "");

    stats.log_phase("final");
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }
    if stats.checkpoint_failures > 0 {
        warn!(
            "{} error checkpoints could not be written; {} is still complete",
            stats.checkpoint_failures,
            checkpoints.path_for(CheckpointLabel::Final).display()
        );
    }
    if stats.songs_failed > 0 {
        warn!(
            "{} songs hit service errors; re-run with the final checkpoint as input",
            stats.songs_failed
        );
    }

    Ok(())
}
