// Reading song records and writing encoded corpora.
//
// Inputs are a JSON array or JSON lines; outputs are JSON lines. Either side
// is gzip-compressed when the path ends in `.gz`.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use songvec_core::{EmbeddedSong, SongRecord};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{info, warn};

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("gz")
}

fn read_text(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut text = String::new();
    if is_gzip(path) {
        GzDecoder::new(BufReader::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Parse a JSON array or JSON lines. Unparsable lines are skipped with a
/// warning so one bad row cannot sink a whole corpus.
fn parse_rows<T: DeserializeOwned>(text: &str, source: &Path) -> Result<Vec<T>> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text)
            .with_context(|| format!("failed to parse JSON array in {}", source.display()));
    }

    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(row) => rows.push(row),
            Err(e) => warn!(file = %source.display(), line = line_no + 1, error = %e, "skipping malformed row"),
        }
    }
    Ok(rows)
}

/// Load training records.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<SongRecord>> {
    let path = path.as_ref();
    let records: Vec<SongRecord> = parse_rows(&read_text(path)?, path)?;
    info!(file = %path.display(), records = records.len(), "records loaded");
    Ok(records)
}

/// Load an encoded corpus written by [`write_embedded`].
pub fn read_embedded<P: AsRef<Path>>(path: P) -> Result<Vec<EmbeddedSong>> {
    let path = path.as_ref();
    parse_rows(&read_text(path)?, path)
}

fn write_lines<T: Serialize, W: Write>(mut writer: W, rows: &[T]) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write encoded songs as JSON lines. Returns the number of rows written.
pub fn write_embedded<P: AsRef<Path>>(path: P, songs: &[EmbeddedSong]) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;

    if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_lines(&mut encoder, songs)?;
        encoder.finish()?.flush()?;
    } else {
        write_lines(BufWriter::new(file), songs)?;
    }

    info!(file = %path.display(), rows = songs.len(), "encoded corpus written");
    Ok(songs.len())
}
