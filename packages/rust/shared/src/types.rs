//! Row types shared by the sheet reader, the pipelines and the CLI.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

/// One row of the keyword sheet (`SL`, `Keywords`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRow {
    /// Serial number as written in the sheet, normalized by [`normalize_serial`].
    pub serial: String,
    pub keyword: String,
}

/// One row of a title sheet (`SL`, `Title`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRow {
    pub serial: String,
    pub title: String,
}

/// One row of the outline sheet (`SL`, `Keywords`, `Outlines`).
///
/// The outline cell is multi-line text; CSV quoting keeps it in one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineRow {
    pub serial: String,
    pub keyword: String,
    pub outline: String,
}

impl KeywordRow {
    pub fn new(serial: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            keyword: keyword.into(),
        }
    }
}

impl OutlineRow {
    pub fn new(
        serial: impl Into<String>,
        keyword: impl Into<String>,
        outline: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            keyword: keyword.into(),
            outline: outline.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serial numbers
// ---------------------------------------------------------------------------

/// Render a serial cell the way an operator expects to see it in a file name.
///
/// Spreadsheet exports often turn `1` into `1.0`; whole-number floats are
/// written without the fraction. Anything else is kept as trimmed text.
pub fn normalize_serial(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(int_part) if !int_part.is_empty() && int_part.chars().all(|c| c.is_ascii_digit()) => {
            int_part.to_string()
        }
        _ => trimmed.to_string(),
    }
}
