//! Normalization pipeline for model-written Markdown.
//!
//! Each pass is a function `&str -> String` applied in sequence. Line
//! passes go through [`map_lines`], which leaves fenced code untouched.

use std::sync::LazyLock;

use regex::Regex;

use crate::NormalizeOptions;

/// Run the full normalization pipeline on a raw completion.
pub(crate) fn run_pipeline(md: &str, opts: &NormalizeOptions) -> String {
    let mut result = normalize_line_endings(md);

    result = strip_outer_fence(&result);
    result = map_lines(&result, strip_qa_prefix);
    result = map_lines(&result, strip_heading_numbering);
    result = map_lines(&result, unify_bullets);
    result = map_lines(&result, normalize_label_bullet);
    result = map_lines(&result, promote_numbered_label);
    result = map_lines(&result, promote_bold_question);
    result = normalize_headings(&result, opts.flatten_subheadings);
    result = remove_introduction_heading(&result);
    result = map_lines(&result, normalize_faq_heading);
    result = space_blocks(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Line helpers
// ---------------------------------------------------------------------------

/// Whether `line` opens or closes a fenced code block.
pub(crate) fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Apply `f` to every line outside fenced code blocks.
pub(crate) fn map_lines(md: &str, f: impl Fn(&str) -> String) -> String {
    let mut in_code_block = false;
    let mut out = Vec::new();

    for line in md.lines() {
        if is_fence(line) {
            in_code_block = !in_code_block;
            out.push(line.to_string());
        } else if in_code_block {
            out.push(line.to_string());
        } else {
            out.push(f(line));
        }
    }

    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings and wrapping fence
// ---------------------------------------------------------------------------

fn normalize_line_endings(md: &str) -> String {
    md.replace("\r\n", "\n").replace('\r', "\n")
}

/// Remove a ```` ```markdown ```` fence that wraps the entire reply.
fn strip_outer_fence(md: &str) -> String {
    static OUTER_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)\A\s*```(?:markdown|md)[ \t]*\n(.*?)\n```[ \t]*\s*\z").expect("valid regex")
    });

    match OUTER_FENCE_RE.captures(md) {
        Some(caps) => caps[1].to_string(),
        None => md.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 2: Question and answer prefixes
// ---------------------------------------------------------------------------

/// `Q: ...` / `**Q: ...?**` / `- A: ...` lose their prefix.
///
/// Any list marker the later passes recognise may sit in front: `-`, `-.`,
/// `*`, `+`, `•`, `–`, or `1.` / `1)`.
fn strip_qa_prefix(line: &str) -> String {
    static QA_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(\s*(?:(?:-\.?|[*+•–]|\d+[.)])\s+)?)(\*\*)?[QA]:(\*\*)?\s+")
            .expect("valid regex")
    });

    let mut current = line.to_string();
    // "Q: A: ..." style stutters need more than one pass
    while let Some(caps) = QA_RE.captures(&current) {
        let keep_bold = caps.get(2).is_some() && caps.get(3).is_none();
        let prefix = format!("{}{}", &caps[1], if keep_bold { "**" } else { "" });
        let rest = &current[caps[0].len()..];
        current = format!("{prefix}{rest}");
    }
    current
}

// ---------------------------------------------------------------------------
// Pass 3: Numbering in front of headings
// ---------------------------------------------------------------------------

/// `10. ## Build a Fund` becomes `## Build a Fund`.
fn strip_heading_numbering(line: &str) -> String {
    static NUMBERED_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*\d+[.)]\s+(#{1,6}\s)").expect("valid regex")
    });

    NUMBERED_HEADING_RE.replace(line, "$1").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: Bullet markers
// ---------------------------------------------------------------------------

/// `-.`, `•`, `–`, `*` and `+` list markers become `- `.
fn unify_bullets(line: &str) -> String {
    static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\s*)(?:-\.|[•–*+])\s+(\S)").expect("valid regex")
    });

    if is_thematic_break(line) {
        return line.to_string();
    }
    BULLET_RE.replace(line, "$1- $2").into_owned()
}

/// `***`, `- - -`, `___` and friends.
fn is_thematic_break(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '-' | '*' | '_')
        && marks.iter().all(|&c| c == marks[0])
}

// ---------------------------------------------------------------------------
// Pass 5: Label bullets
// ---------------------------------------------------------------------------

static BOLD_COLON_INSIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*([^*\n]+?):\*\*\s*(.*)$").expect("valid regex")
});

static BOLD_COLON_OUTSIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*([^*\n]+?)\*\*:\s*(.*)$").expect("valid regex")
});

// The colon must be followed by whitespace or the end of the line, which
// keeps `https://` from reading as a label.
static PLAIN_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][^:*\n]{0,59}):(?:\s+(.*))?$").expect("valid regex")
});

/// Split `body` into a label and the text after it, for any of the
/// `**Label:** text`, `**Label**: text` or `Label: text` forms.
fn split_label(body: &str) -> Option<(String, String)> {
    let caps = BOLD_COLON_INSIDE_RE
        .captures(body)
        .or_else(|| BOLD_COLON_OUTSIDE_RE.captures(body))
        .or_else(|| PLAIN_LABEL_RE.captures(body))?;
    let label = caps[1].trim().to_string();
    let rest = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
    if label.is_empty() {
        return None;
    }
    Some((label, rest))
}

fn join_label(label: &str, rest: &str) -> String {
    if rest.is_empty() {
        format!("**{label}:**")
    } else {
        format!("**{label}:** {rest}")
    }
}

/// `- Label: text` and its bold variants become `- **Label:** text`.
fn normalize_label_bullet(line: &str) -> String {
    static LABEL_BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\s*)- (.+)$").expect("valid regex")
    });

    let Some(caps) = LABEL_BULLET_RE.captures(line) else {
        return line.to_string();
    };
    match split_label(&caps[2]) {
        Some((label, rest)) => format!("{}- {}", &caps[1], join_label(&label, &rest)),
        None => line.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 6: Numbered labels
// ---------------------------------------------------------------------------

/// `1. **Label:** text` becomes the paragraph `**1. Label:** text`.
fn promote_numbered_label(line: &str) -> String {
    static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\d+)[.)]\s+(.+)$").expect("valid regex")
    });

    let Some(caps) = NUMBERED_RE.captures(line) else {
        return line.to_string();
    };
    match split_label(&caps[2]) {
        Some((label, rest)) => join_label(&format!("{}. {label}", &caps[1]), &rest),
        None => line.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 7: Bold questions
// ---------------------------------------------------------------------------

/// A line that is only a bold question becomes an H2.
fn promote_bold_question(line: &str) -> String {
    static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*\*\*([^*\n]+\?)\*\*\s*$").expect("valid regex")
    });

    match QUESTION_RE.captures(line) {
        Some(caps) => format!("## {}", caps[1].trim()),
        None => line.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 8: Heading levels
// ---------------------------------------------------------------------------

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]*(.*?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex")
});

/// Parse an ATX heading into its level and text.
pub(crate) fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING_RE.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let text = caps.get(2)?.as_str();
    Some((level, text))
}

/// Enforce a space after the hashes, keep the first H1 only and level the rest.
///
/// With `flatten` every H2 to H6 becomes H2. Without it a heading may sit at
/// most one level below the previous heading.
fn normalize_headings(md: &str, flatten: bool) -> String {
    let mut in_code_block = false;
    let mut seen_h1 = false;
    let mut last_level = 1;
    let mut lines: Vec<String> = Vec::new();

    for line in md.lines() {
        if is_fence(line) {
            in_code_block = !in_code_block;
            lines.push(line.to_string());
            continue;
        }
        if in_code_block {
            lines.push(line.to_string());
            continue;
        }

        let Some((level, text)) = parse_heading(line) else {
            lines.push(line.to_string());
            continue;
        };

        let text = unwrap_bold(text);
        if text.is_empty() {
            // Bare hashes carry nothing
            continue;
        }

        let level = if level == 1 {
            if seen_h1 || is_section_heading(text) {
                // Demote duplicate H1s to H2
                2
            } else {
                seen_h1 = true;
                1
            }
        } else if flatten {
            2
        } else {
            level.min(last_level + 1).max(2)
        };

        last_level = level;
        lines.push(format!("{} {text}", "#".repeat(level)));
    }

    lines.join("\n")
}

/// Introduction and FAQ headings, which later passes drop or rewrite, so
/// they never take the H1 slot.
fn is_section_heading(text: &str) -> bool {
    static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^\**\s*(?:introduction|FAQs?|Frequently Asked Questions)(?:\s*\((?:FAQs?|Frequently Asked Questions)\))?\s*:?\s*\**\s*:?$",
        )
        .expect("valid regex")
    });

    SECTION_RE.is_match(text.trim())
}

/// `**Title**` becomes `Title`; partially bold text is left alone.
fn unwrap_bold(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("**").and_then(|t| t.strip_suffix("**")) {
        Some(inner) if !inner.contains("**") && !inner.trim().is_empty() => inner.trim(),
        _ => trimmed,
    }
}

// ---------------------------------------------------------------------------
// Pass 9: Introduction heading
// ---------------------------------------------------------------------------

/// Drop an `Introduction` heading line; the paragraphs under it stay.
fn remove_introduction_heading(md: &str) -> String {
    static INTRO_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:#{1,6}\s+\**introduction:?\**|\*\*introduction:?\*\*)\s*$")
            .expect("valid regex")
    });

    let mut in_code_block = false;
    let mut lines = Vec::new();
    for line in md.lines() {
        if is_fence(line) {
            in_code_block = !in_code_block;
        } else if !in_code_block && INTRO_RE.is_match(line) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 10: FAQ heading
// ---------------------------------------------------------------------------

/// Every spelling of the FAQ heading becomes `## Frequently Asked Questions:`.
fn normalize_faq_heading(line: &str) -> String {
    static FAQ_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*)?\s*(?:FAQs?|Frequently Asked Questions)(?:\s*\((?:FAQs?|Frequently Asked Questions)\))?\s*:?\s*(?:\*\*)?\s*:?\s*$",
        )
        .expect("valid regex")
    });

    if FAQ_RE.is_match(line) {
        "## Frequently Asked Questions:".to_string()
    } else {
        line.to_string()
    }
}

// ---------------------------------------------------------------------------
// Pass 11: Block spacing
// ---------------------------------------------------------------------------

/// One blank line around every heading and before every bold-led paragraph.
fn space_blocks(md: &str) -> String {
    let mut in_code_block = false;
    let mut blank_after = false;
    let mut out: Vec<&str> = Vec::new();

    for line in md.lines() {
        let blank = line.trim().is_empty();

        if is_fence(line) {
            in_code_block = !in_code_block;
        }
        let code = in_code_block || is_fence(line);

        if blank_after && !blank {
            out.push("");
        }
        blank_after = false;

        if !code && !blank {
            let heading = parse_heading(line).is_some();
            let bold_lead = line.starts_with("**");
            if (heading || bold_lead) && out.last().is_some_and(|l| !l.trim().is_empty()) {
                out.push("");
            }
            blank_after = heading;
        }

        out.push(line);
    }

    out.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 12: Whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace, collapse blank runs outside code and drop leading blanks.
fn normalize_whitespace(md: &str) -> String {
    let mut in_code_block = false;
    let mut out: Vec<&str> = Vec::new();

    for line in md.lines().map(str::trim_end) {
        if is_fence(line) {
            in_code_block = !in_code_block;
        }
        let blank = line.is_empty();
        if blank && !in_code_block && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }

    out.join("\n")
}

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_markdown_fence_removed() {
        let input = "```markdown\n# Title\n\nBody\n```\n";
        assert_eq!(strip_outer_fence(input), "# Title\n\nBody");
    }

    #[test]
    fn inner_code_fence_kept() {
        let input = "# Title\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn qa_prefixes_removed() {
        assert_eq!(
            strip_qa_prefix("**Q: When should I seek advice?**"),
            "**When should I seek advice?**"
        );
        assert_eq!(strip_qa_prefix("A: If you feel unsure."), "If you feel unsure.");
        assert_eq!(strip_qa_prefix("**Q:** Is it safe?"), "Is it safe?");
        assert_eq!(strip_qa_prefix("- q: lower case"), "- lower case");
    }

    #[test]
    fn qa_prefixes_removed_after_any_list_marker() {
        for (line, expected) in [
            ("– Q: What is it?", "– What is it?"),
            ("-. A: A thing.", "-. A thing."),
            ("1. Q: What is it?", "1. What is it?"),
            ("2) **A:** Yes.", "2) Yes."),
            ("  • Q: Nested?", "  • Nested?"),
        ] {
            assert_eq!(strip_qa_prefix(line), expected, "input: {line}");
        }
    }

    #[test]
    fn qa_prefix_needs_line_start() {
        let line = "Plan A: save first.";
        assert_eq!(strip_qa_prefix(line), line);
    }

    #[test]
    fn heading_numbering_stripped_but_inner_number_kept() {
        assert_eq!(strip_heading_numbering("10. ## Build a Fund"), "## Build a Fund");
        assert_eq!(
            strip_heading_numbering("## 10.5 Build a Fund"),
            "## 10.5 Build a Fund"
        );
    }

    #[test]
    fn bullets_unified() {
        assert_eq!(unify_bullets("-. Track spending"), "- Track spending");
        assert_eq!(unify_bullets("• Track spending"), "- Track spending");
        assert_eq!(unify_bullets("  * Nested"), "  - Nested");
        assert_eq!(unify_bullets("+ Plus"), "- Plus");
        assert_eq!(unify_bullets("**Bold** start"), "**Bold** start");
        assert_eq!(unify_bullets("* * *"), "* * *");
    }

    #[test]
    fn label_bullets_normalized() {
        assert_eq!(
            normalize_label_bullet("- Budgeting: track every dollar"),
            "- **Budgeting:** track every dollar"
        );
        assert_eq!(
            normalize_label_bullet("- **Budgeting**: track every dollar"),
            "- **Budgeting:** track every dollar"
        );
        assert_eq!(
            normalize_label_bullet("- **Budgeting:**track"),
            "- **Budgeting:** track"
        );
        assert_eq!(
            normalize_label_bullet("- **Budgeting:** track"),
            "- **Budgeting:** track"
        );
    }

    #[test]
    fn urls_are_not_labels() {
        let line = "- https://example.com/guide";
        assert_eq!(normalize_label_bullet(line), line);
    }

    #[test]
    fn numbered_labels_become_bold_paragraphs() {
        assert_eq!(
            promote_numbered_label("1. **Create a Budget:** list income"),
            "**1. Create a Budget:** list income"
        );
        assert_eq!(
            promote_numbered_label("2. Pay Yourself First: automate it"),
            "**2. Pay Yourself First:** automate it"
        );
        assert_eq!(
            promote_numbered_label("3. Just a numbered item"),
            "3. Just a numbered item"
        );
    }

    #[test]
    fn bold_question_becomes_heading() {
        assert_eq!(
            promote_bold_question("**When should I seek professional advice?**"),
            "## When should I seek professional advice?"
        );
        assert_eq!(
            promote_bold_question("**Not a question.**"),
            "**Not a question.**"
        );
    }

    #[test]
    fn headings_flattened_and_h1_deduplicated() {
        let input = "#Title\n\n### Deep\n\n# Second Title\n\n#### Deeper";
        assert_eq!(
            normalize_headings(input, true),
            "# Title\n\n## Deep\n\n## Second Title\n\n## Deeper"
        );
    }

    #[test]
    fn headings_clamped_without_flatten() {
        let input = "# Title\n\n#### Jump\n\n### Sub\n\n## Back";
        assert_eq!(
            normalize_headings(input, false),
            "# Title\n\n## Jump\n\n### Sub\n\n## Back"
        );
    }

    #[test]
    fn section_headings_do_not_claim_h1() {
        assert_eq!(
            normalize_headings("# FAQs\n# Title\n# Introduction:\n# Other", true),
            "## FAQs\n# Title\n## Introduction:\n## Other"
        );
    }

    #[test]
    fn heading_bold_and_closing_hashes_removed() {
        assert_eq!(normalize_headings("## **Build a Fund** ##", true), "## Build a Fund");
    }

    #[test]
    fn headings_in_code_untouched() {
        let input = "```bash\n# comment\n```";
        assert_eq!(normalize_headings(input, true), input);
    }

    #[test]
    fn introduction_heading_removed_body_kept() {
        let input = "# Title\n\n## Introduction\n\nWelcome.";
        assert_eq!(remove_introduction_heading(input), "# Title\n\n\nWelcome.");
    }

    #[test]
    fn faq_variants_unified() {
        for line in [
            "## FAQs",
            "FAQs:",
            "**Frequently Asked Questions**",
            "### Frequently asked questions:",
            "## FAQs (Frequently Asked Questions)",
        ] {
            assert_eq!(
                normalize_faq_heading(line),
                "## Frequently Asked Questions:",
                "input: {line}"
            );
        }
        assert_eq!(normalize_faq_heading("FAQs are useful."), "FAQs are useful.");
    }

    #[test]
    fn blocks_spaced() {
        let input = "# Title\nIntro text\n## Section\n**Tip:** read";
        assert_eq!(
            space_blocks(input),
            "# Title\n\nIntro text\n\n## Section\n\n**Tip:** read"
        );
    }

    #[test]
    fn whitespace_collapsed() {
        let input = "\n\nLine 1   \n\n\n\nLine 2\t";
        assert_eq!(normalize_whitespace(input), "Line 1\n\nLine 2");
    }

    #[test]
    fn blank_lines_in_code_kept() {
        let input = "```\na\n\n\nb\n```";
        assert_eq!(normalize_whitespace(input), input);
    }

    #[test]
    fn ensure_trailing_newline_normalizes_multiple() {
        assert_eq!(ensure_trailing_newline("Content\n\n\n"), "Content\n");
        assert_eq!(ensure_trailing_newline("Content"), "Content\n");
    }
}
