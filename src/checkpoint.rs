//! Checkpoints of songs not yet added to a playlist.
//!
//! One checkpoint is written per service error, tagged with the batch and
//! row where it happened, and one unconditionally at the end of the run.

use anyhow::Result;
use encoding_rs::Encoding;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::SongRequest;
use crate::safety::validate_output_path;
use crate::table::SongTable;

/// File-name prefix shared by every checkpoint
pub const CHECKPOINT_PREFIX: &str = "MissedSongs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointLabel {
    /// Written after a service error at (batch index, input row)
    Error { batch: usize, row: usize },
    /// Written once after all batches
    Final,
}

impl CheckpointLabel {
    pub fn file_name(&self) -> String {
        match self {
            CheckpointLabel::Error { batch, row } => {
                format!("{}_{}_{}.csv", CHECKPOINT_PREFIX, batch, row)
            }
            CheckpointLabel::Final => format!("{}_Final.csv", CHECKPOINT_PREFIX),
        }
    }
}

/// Destination for checkpoint tables.
pub trait CheckpointSink {
    /// Persist `rows` (in input order) under `label`.
    fn write(&mut self, label: CheckpointLabel, rows: &[&SongRequest]) -> Result<()>;
}

/// Writes checkpoints as CSV files carrying every original column.
pub struct CsvCheckpointWriter<'a> {
    table: &'a SongTable,
    dir: PathBuf,
    source: PathBuf,
    encoding: &'static Encoding,
}

impl<'a> CsvCheckpointWriter<'a> {
    pub fn new(
        table: &'a SongTable,
        dir: impl Into<PathBuf>,
        source: impl Into<PathBuf>,
        encoding: &'static Encoding,
    ) -> Self {
        Self {
            table,
            dir: dir.into(),
            source: source.into(),
            encoding,
        }
    }

    pub fn path_for(&self, label: CheckpointLabel) -> PathBuf {
        self.dir.join(label.file_name())
    }
}

impl CheckpointSink for CsvCheckpointWriter<'_> {
    fn write(&mut self, label: CheckpointLabel, rows: &[&SongRequest]) -> Result<()> {
        let path = self.path_for(label);
        validate_output_path(&path, CHECKPOINT_PREFIX, &[self.source.as_path()])?;
        std::fs::create_dir_all(&self.dir)?;
        self.table.write_subset(&path, rows, self.encoding)?;
        info!("Checkpoint {}: {} songs not added", path.display(), rows.len());
        Ok(())
    }
}

/// In-memory sink that keeps the ids of every checkpoint.
#[derive(Debug, Default)]
pub struct MemoryCheckpoints {
    pub written: Vec<(CheckpointLabel, Vec<String>)>,
}

impl MemoryCheckpoints {
    pub fn get(&self, label: CheckpointLabel) -> Option<&[String]> {
        self.written
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, ids)| ids.as_slice())
    }
}

impl CheckpointSink for MemoryCheckpoints {
    fn write(&mut self, label: CheckpointLabel, rows: &[&SongRequest]) -> Result<()> {
        self.written
            .push((label, rows.iter().map(|s| s.id.clone()).collect()));
        Ok(())
    }
}

/// True if `path` looks like a checkpoint file
pub fn is_checkpoint_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(CHECKPOINT_PREFIX) && n.ends_with(".csv"))
}

/// True if `input` is a checkpoint living in `dir`, where a later run could
/// overwrite it with a checkpoint of the same name.
pub fn is_checkpoint_in_dir(input: &Path, dir: &Path) -> bool {
    if !is_checkpoint_file(input) {
        return false;
    }
    let parent = match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), dir.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::encoding_for_label;

    #[test]
    fn test_file_names() {
        assert_eq!(
            CheckpointLabel::Error { batch: 0, row: 5 }.file_name(),
            "MissedSongs_0_5.csv"
        );
        assert_eq!(CheckpointLabel::Final.file_name(), "MissedSongs_Final.csv");
        assert!(is_checkpoint_file(Path::new("out/MissedSongs_1_200.csv")));
        assert!(!is_checkpoint_file(Path::new("out/SongsToAdd.csv")));
    }

    #[test]
    fn test_csv_writer_writes_subset() {
        let dir = tempfile::tempdir().unwrap();
        let table = SongTable::parse("ID,Artist,Song\n1,Tool,Sober\n2,Tool,Schism\n").unwrap();
        let encoding = encoding_for_label("utf-8").unwrap();
        let mut writer = CsvCheckpointWriter::new(
            &table,
            dir.path().join("checkpoints"),
            dir.path().join("SongsToAdd.csv"),
            encoding,
        );

        let rows: Vec<&SongRequest> = table.songs.iter().skip(1).collect();
        writer
            .write(CheckpointLabel::Error { batch: 0, row: 0 }, &rows)
            .unwrap();

        let written =
            std::fs::read_to_string(dir.path().join("checkpoints/MissedSongs_0_0.csv")).unwrap();
        assert_eq!(written, "ID,Artist,Song\n2,Tool,Schism\n");
    }

    #[test]
    fn test_csv_writer_refuses_to_overwrite_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("MissedSongs_Final.csv");
        std::fs::write(&source, "ID,Artist,Song\n1,Tool,Sober\n").unwrap();
        let table = SongTable::parse("ID,Artist,Song\n1,Tool,Sober\n").unwrap();
        let encoding = encoding_for_label("utf-8").unwrap();
        let mut writer = CsvCheckpointWriter::new(&table, dir.path(), &source, encoding);

        let rows: Vec<&SongRequest> = table.songs.iter().collect();
        assert!(writer.write(CheckpointLabel::Final, &rows).is_err());
    }

    #[test]
    fn test_checkpoint_input_in_checkpoint_dir() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let resumed = dir.path().join("MissedSongs_0_1.csv");

        assert!(is_checkpoint_in_dir(&resumed, dir.path()));
        assert!(is_checkpoint_in_dir(&resumed, &dir.path().join(".")));
        assert!(!is_checkpoint_in_dir(&resumed, other.path()));
        assert!(!is_checkpoint_in_dir(&dir.path().join("SongsToAdd.csv"), dir.path()));
        // Missing checkpoint dir cannot hold the input
        assert!(!is_checkpoint_in_dir(&resumed, &dir.path().join("missing")));
    }

    #[test]
    fn test_memory_checkpoints() {
        let song = SongRequest {
            row: 0,
            id: "42".to_string(),
            artist: "Tool".to_string(),
            song: "Sober".to_string(),
        };
        let mut sink = MemoryCheckpoints::default();
        sink.write(CheckpointLabel::Final, &[&song]).unwrap();
        assert_eq!(sink.get(CheckpointLabel::Final), Some(&["42".to_string()][..]));
        assert!(sink.get(CheckpointLabel::Error { batch: 0, row: 0 }).is_none());
    }
}
