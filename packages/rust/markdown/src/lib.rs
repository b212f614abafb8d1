//! Markdown normalization for model-written articles.
//!
//! Chat models return Markdown with irregular heading levels, stray
//! numbering and a dozen spellings of the FAQ section. [`normalize`] reshapes
//! that text deterministically so the document renderer sees one dialect.

mod cleanup;
mod outline;

use tracing::{debug, instrument};

use seoscribe_shared::MarkdownConfig;

pub use outline::clean_outline;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Switches for [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Collapse every sub-heading (H2 to H6) to H2. When off, headings are
    /// only clamped so none sits more than one level below its parent.
    pub flatten_subheadings: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            flatten_subheadings: true,
        }
    }
}

impl From<&MarkdownConfig> for NormalizeOptions {
    fn from(config: &MarkdownConfig) -> Self {
        Self {
            flatten_subheadings: config.flatten_subheadings,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Normalize a raw completion into clean Markdown.
///
/// The result has at most one H1, unified bullets and label formatting, a
/// canonical FAQ heading, one blank line between blocks and a single
/// trailing newline. Fenced code is never rewritten. Running it twice
/// gives the same text as running it once.
#[instrument(skip_all, fields(bytes = md.len()))]
pub fn normalize(md: &str, opts: &NormalizeOptions) -> String {
    let result = cleanup::run_pipeline(md, opts);
    debug!(
        bytes_out = result.len(),
        words = count_words(&result),
        "markdown normalized"
    );
    result
}

/// Text of the first H1 outside code blocks.
pub fn extract_title(md: &str) -> Option<String> {
    let mut in_code_block = false;
    for line in md.lines() {
        if cleanup::is_fence(line) {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        if let Some((1, text)) = cleanup::parse_heading(line) {
            let text = text.trim().trim_matches('*').trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Count words outside fenced code blocks, ignoring bare Markdown markers.
pub fn count_words(md: &str) -> usize {
    let mut in_code_block = false;
    let mut words = 0;
    for line in md.lines() {
        if cleanup::is_fence(line) {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        words += line
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .count();
    }
    words
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
