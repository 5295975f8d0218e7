//! Progress reporting for the song loop.
//!
//! Interactive runs get one bar over every input row. With `--log-only` the
//! bar is hidden and `log_progress` emits a tracing line every few rows.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const ROW_BAR_TEMPLATE: &str =
    "{msg} {wide_bar:.green/white} {pos}/{len} rows [{elapsed_precise}, ETA {eta}]";

static ROWS_AS_LOG_LINES: AtomicBool = AtomicBool::new(false);

/// Report row progress as log lines instead of a bar. Set once from `main`.
pub fn set_log_only(enabled: bool) {
    ROWS_AS_LOG_LINES.store(enabled, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    ROWS_AS_LOG_LINES.load(Ordering::Relaxed)
}

/// Run time for the summary banner: `12.3s` under a minute, else `4m05s`.
pub fn format_duration(d: Duration) -> String {
    let whole = d.as_secs();
    if whole < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m{:02}s", whole / 60, whole % 60)
    }
}

/// Bar over `rows` input rows, hidden in log-only mode.
pub fn create_progress_bar(rows: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(rows);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else if let Ok(style) = ProgressStyle::default_bar().template(ROW_BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(msg.to_string());
    pb
}

/// In log-only mode, log every `interval` rows and once at the last row.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if is_log_only() && total > 0 && (current % interval.max(1) == 0 || current == total) {
        let pct = 100.0 * current as f64 / total as f64;
        tracing::info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(605)), "10m05s");
    }
}
