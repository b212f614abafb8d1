//! Spreadsheet I/O for SEOScribe.
//!
//! Keyword and outline sheets are CSV files with a header row. Reading is
//! tolerant of what spreadsheet exports produce (BOM, stray bytes, header
//! case, `1.0` serials); writing keeps the outline sheet valid after every row.

use std::fs::File;
use std::path::{Path, PathBuf};

use seoscribe_shared::{KeywordRow, OutlineRow, Result, SeoScribeError, TitleRow, normalize_serial};

/// Serial number column.
pub const SERIAL_COLUMN: &str = "SL";
/// Keyword column.
pub const KEYWORD_COLUMN: &str = "Keywords";
/// Title column.
pub const TITLE_COLUMN: &str = "Title";
/// Outline text column.
pub const OUTLINE_COLUMN: &str = "Outlines";

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read `SL` and `Keywords`. Rows with a blank keyword are skipped.
pub fn read_keywords(path: &Path) -> Result<Vec<KeywordRow>> {
    let rows = read_columns(path, &[SERIAL_COLUMN, KEYWORD_COLUMN])?;
    Ok(rows
        .into_iter()
        .filter_map(|(line, mut cells)| {
            let keyword = cells.pop().unwrap_or_default();
            let serial = cells.pop().unwrap_or_default();
            if keyword.is_empty() {
                tracing::warn!(path = %path.display(), line, %serial, "skipping row with blank keyword");
                return None;
            }
            Some(KeywordRow {
                serial: normalize_serial(&serial),
                keyword,
            })
        })
        .collect())
}

/// Read `SL` and `Title`. Rows with a blank title are skipped.
pub fn read_titles(path: &Path) -> Result<Vec<TitleRow>> {
    let rows = read_columns(path, &[SERIAL_COLUMN, TITLE_COLUMN])?;
    Ok(rows
        .into_iter()
        .filter_map(|(line, mut cells)| {
            let title = cells.pop().unwrap_or_default();
            let serial = cells.pop().unwrap_or_default();
            if title.is_empty() {
                tracing::warn!(path = %path.display(), line, %serial, "skipping row with blank title");
                return None;
            }
            Some(TitleRow {
                serial: normalize_serial(&serial),
                title,
            })
        })
        .collect())
}

/// Read the `SL` column.
pub fn read_serials(path: &Path) -> Result<Vec<String>> {
    let rows = read_columns(path, &[SERIAL_COLUMN])?;
    Ok(rows
        .into_iter()
        .filter_map(|(_, mut cells)| cells.pop())
        .map(|s| normalize_serial(&s))
        .collect())
}

/// Read `SL`, `Keywords` and `Outlines`. Rows with a blank outline are skipped.
pub fn read_outlines(path: &Path) -> Result<Vec<OutlineRow>> {
    let rows = read_columns(path, &[SERIAL_COLUMN, KEYWORD_COLUMN, OUTLINE_COLUMN])?;
    Ok(rows
        .into_iter()
        .filter_map(|(line, mut cells)| {
            let outline = cells.pop().unwrap_or_default();
            let keyword = cells.pop().unwrap_or_default();
            let serial = cells.pop().unwrap_or_default();
            if outline.is_empty() {
                tracing::warn!(path = %path.display(), line, %serial, "skipping row with blank outline");
                return None;
            }
            Some(OutlineRow {
                serial: normalize_serial(&serial),
                keyword,
                outline,
            })
        })
        .collect())
}

/// Load the file and return the trimmed cells of `columns` for every non-blank row,
/// paired with the 1-based data line number.
fn read_columns(path: &Path, columns: &[&str]) -> Result<Vec<(u64, Vec<String>)>> {
    let bytes = std::fs::read(path).map_err(|e| SeoScribeError::io(path, e))?;
    let text = decode_lossy(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SeoScribeError::sheet(format!("{}: {e}", path.display())))?
        .clone();

    let indices = columns
        .iter()
        .map(|col| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(col))
                .ok_or_else(|| {
                    SeoScribeError::sheet(format!(
                        "column '{col}' not found in {}",
                        path.display()
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| SeoScribeError::sheet(format!("{}: {e}", path.display())))?;
        let cells: Vec<String> = indices
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().trim().to_string())
            .collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push((index as u64 + 1, cells));
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "read sheet");
    Ok(rows)
}

/// UTF-8 decode that drops invalid sequences and a leading BOM.
fn decode_lossy(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_ref());
    text.chars().filter(|&c| c != char::REPLACEMENT_CHARACTER).collect()
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Incremental writer for the outline sheet.
///
/// The file is truncated and given a header on creation. Each appended row
/// is flushed immediately so an interrupted run leaves a readable file.
pub struct OutlineWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl OutlineWriter {
    /// Create (or truncate) the outline sheet at `path` and write its header.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SeoScribeError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| SeoScribeError::io(path, e))?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record([SERIAL_COLUMN, KEYWORD_COLUMN, OUTLINE_COLUMN])
            .map_err(|e| SeoScribeError::sheet(e.to_string()))?;
        writer.flush().map_err(|e| SeoScribeError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, row: &OutlineRow) -> Result<()> {
        self.writer
            .write_record([&row.serial, &row.keyword, &row.outline])
            .map_err(|e| SeoScribeError::sheet(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| SeoScribeError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Path of the sheet being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended so far (header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows
    }
}
