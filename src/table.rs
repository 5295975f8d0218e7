//! Song table reading and writing.
//!
//! Tables are CSV files with at least `ID`, `Artist` and `Song` columns
//! (header match is case-insensitive). Every other column is carried through
//! untouched so checkpoint files look like the input.

use anyhow::{anyhow, bail, Context, Result};
use csv::StringRecord;
use encoding_rs::Encoding;
use std::path::Path;
use tracing::warn;

use crate::models::SongRequest;

pub const ID_COLUMN: &str = "ID";
pub const ARTIST_COLUMN: &str = "Artist";
pub const SONG_COLUMN: &str = "Song";

/// Resolve an encoding label such as `iso-8859-1`, `latin1` or `utf-8`.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| anyhow!("Unknown text encoding: {}", label))
}

/// Input table: header, original records and the parsed song rows.
#[derive(Debug, Clone)]
pub struct SongTable {
    pub headers: StringRecord,
    pub records: Vec<StringRecord>,
    pub songs: Vec<SongRequest>,
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("Missing column '{}' in song table", name))
}

impl SongTable {
    /// Parse already-decoded CSV text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().context("Failed to read header row")?.clone();

        let id_idx = column_index(&headers, ID_COLUMN)?;
        let artist_idx = column_index(&headers, ARTIST_COLUMN)?;
        let song_idx = column_index(&headers, SONG_COLUMN)?;

        let mut records = Vec::new();
        let mut songs = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Invalid CSV record at row {}", row + 1))?;
            let field = |idx: usize| record.get(idx).unwrap_or("").to_string();
            songs.push(SongRequest {
                row,
                id: field(id_idx),
                artist: field(artist_idx),
                song: field(song_idx),
            });
            records.push(record);
        }

        Ok(Self {
            headers,
            records,
            songs,
        })
    }

    /// Read and decode a song table from disk.
    pub fn read(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read song table {}", path.display()))?;
        let (text, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            warn!(
                "Song table {} contains bytes that are not valid {}",
                path.display(),
                encoding.name()
            );
        }
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the original records of `rows`, in the given order, under the original header.
    pub fn write_subset(
        &self,
        path: &Path,
        rows: &[&SongRequest],
        encoding: &'static Encoding,
    ) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for song in rows {
            let Some(record) = self.records.get(song.row) else {
                bail!("Row {} (id {}) is not part of the song table", song.row, song.id);
            };
            writer.write_record(record)?;
        }
        let buf = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV buffer: {}", e.error()))?;
        let text = String::from_utf8(buf).context("CSV output is not valid UTF-8")?;

        let (bytes, _, unmappable) = encoding.encode(&text);
        if unmappable {
            warn!(
                "{} contains characters not representable in {}",
                path.display(),
                encoding.name()
            );
        }
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
