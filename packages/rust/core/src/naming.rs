//! Output file naming.

/// Characters that cannot appear in a file name on common platforms.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// `"{serial}. {keyword}"` with path-reserved characters replaced by `.`.
///
/// Both parts are cleaned, so the stem is always a single path component.
pub fn file_stem(serial: &str, keyword: &str) -> String {
    format!("{}. {}", clean_component(serial), clean_component(keyword))
}

fn clean_component(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if RESERVED.contains(&c) { '.' } else { c })
        .collect()
}

/// Document name for a row, e.g. `3. best budget apps.docx`.
pub fn document_file_name(serial: &str, keyword: &str) -> String {
    format!("{}.docx", file_stem(serial, keyword))
}

/// Name of the raw-reply file kept next to a row's document.
pub fn debug_markdown_file_name(serial: &str, keyword: &str) -> String {
    format!("{}.md", file_stem(serial, keyword))
}
