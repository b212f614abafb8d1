//! Cleanup for outline replies before they are stored in the outline sheet.

use std::sync::LazyLock;

use regex::Regex;

use crate::cleanup::map_lines;

/// Strip outline enumeration (`I.`, `A)`, `1.2.`, `H2:`) at the start of lines.
///
/// Heading hashes, list markers and bold markers in front of the
/// enumeration are kept. Blank-line runs collapse and the result is trimmed.
pub fn clean_outline(md: &str) -> String {
    let stripped = map_lines(&md.replace("\r\n", "\n"), strip_enumeration);

    let mut out: Vec<&str> = Vec::new();
    for line in stripped.lines().map(str::trim_end) {
        if line.is_empty() && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

fn strip_enumeration(line: &str) -> String {
    static ENUM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"^(\s*(?:#{1,6}\s+)?(?:[-*+]\s+)?(?:\*\*)?)(?:H[1-6]\s*[:\-]\s*|(?:[IVXLC]+|[ivxlc]+|[A-Za-z]|\d+(?:\.\d+)*)[.)]\s+)",
        )
        .expect("valid regex")
    });

    let mut current = line.to_string();
    // "I. A. Budget" carries two levels of enumeration
    for _ in 0..3 {
        let next = ENUM_RE.replace(&current, "$1").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}
