//! Two-line preview ingestion
//!
//! A source only needs its header and one sample row, so files are read in
//! chunks and reading stops as soon as two lines are available.

use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace};

use super::{DataSource, SourceFile};
use crate::config::IngestConfig;
use crate::error::{MapperError, Result};
use crate::schema::new_id;

/// Header columns and the first data row of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePreview {
    pub columns: Vec<String>,
    pub sample_row: Vec<String>,
}

fn normalize_cell(cell: &str) -> String {
    let s = cell.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

fn split_cells(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(normalize_cell).collect()
}

/// Split a header line and a sample line into cells
pub fn parse_preview(header: &str, row: &str, delimiter: char) -> SourcePreview {
    let header = header.strip_prefix('\u{feff}').unwrap_or(header);
    SourcePreview {
        columns: split_cells(header.trim_end_matches('\r'), delimiter),
        sample_row: split_cells(row.trim_end_matches('\r'), delimiter),
    }
}

/// Locate the first two lines in `buf`. Before end of stream both must be
/// newline-terminated; at end of stream an unterminated second line counts.
fn first_two_lines(buf: &[u8], eof: bool) -> Option<(&[u8], &[u8])> {
    let first = buf.iter().position(|&b| b == b'\n')?;
    let rest = &buf[first + 1..];
    match rest.iter().position(|&b| b == b'\n') {
        Some(second) => Some((&buf[..first], &rest[..second])),
        None if eof && !rest.is_empty() => Some((&buf[..first], rest)),
        None => None,
    }
}

/// Read chunks from `reader` until a header and a sample line are available
pub async fn read_preview<R>(
    mut reader: R,
    name: &str,
    config: &IngestConfig,
) -> Result<SourcePreview>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; config.chunk_size.max(1)];

    loop {
        let n = reader.read(&mut chunk).await?;
        let eof = n == 0;
        buf.extend_from_slice(&chunk[..n]);

        if let Some((header, row)) = first_two_lines(&buf, eof) {
            let header = String::from_utf8_lossy(header);
            let row = String::from_utf8_lossy(row);
            return Ok(parse_preview(&header, &row, config.delimiter));
        }
        if eof {
            return Err(MapperError::IncompletePreview {
                file: name.to_string(),
            });
        }
        trace!(file = name, bytes = buf.len(), "waiting for two lines");
    }
}

/// Read the preview of a file on disk and wrap it as a new data source
pub async fn ingest_file(path: &Path, config: &IngestConfig) -> Result<DataSource> {
    let file = SourceFile::from_path(path);
    let handle = tokio::fs::File::open(path).await?;
    let preview = read_preview(handle, &file.name, config).await?;
    debug!(file = %file.name, columns = preview.columns.len(), "preview read");
    Ok(DataSource::new(new_id(), file, preview))
}
