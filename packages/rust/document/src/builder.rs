//! Markdown events to a flat block model.
//!
//! Word documents have no nesting of block content inside lists or quotes,
//! so everything is flattened into paragraphs that carry their style,
//! list membership and indentation.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Left indent per list or quote level, in twentieths of a point.
pub(crate) const INDENT_STEP_TWIPS: u32 = 720;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Paragraph style ids defined in `styles.xml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParaStyle {
    Normal,
    Heading(u8),
    Quote,
    Code,
    ListParagraph,
}

impl ParaStyle {
    pub(crate) fn style_id(&self) -> String {
        match self {
            Self::Normal => "Normal".into(),
            Self::Heading(level) => format!("Heading{level}"),
            Self::Quote => "Quote".into(),
            Self::Code => "CodeBlock".into(),
            Self::ListParagraph => "ListParagraph".into(),
        }
    }
}

/// Character formatting of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inline {
    Text {
        text: String,
        format: RunFormat,
        /// Index into the document's hyperlink targets.
        link: Option<usize>,
    },
    Break,
}

/// Membership of a paragraph in a numbering instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListRef {
    pub num_id: u32,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Paragraph {
    pub style: ParaStyle,
    pub inlines: Vec<Inline>,
    pub list: Option<ListRef>,
    pub indent_twips: Option<u32>,
    /// Drawn as a horizontal rule.
    pub rule: bool,
}

impl Paragraph {
    fn new(style: ParaStyle) -> Self {
        Self {
            style,
            inlines: Vec::new(),
            list: None,
            indent_twips: None,
            rule: false,
        }
    }

    /// Concatenated text, breaks as newlines.
    pub(crate) fn plain_text(&self) -> String {
        self.inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text { text, .. } => text.as_str(),
                Inline::Break => "\n",
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Table {
    /// Rows of cells; the first `header_rows` rows repeat as header.
    pub rows: Vec<Vec<Vec<Inline>>>,
    pub header_rows: usize,
}

impl Table {
    pub(crate) fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// A numbered list instance; each gets its own `w:num` so it restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrderedList {
    pub num_id: u32,
    pub level: u32,
    pub start: u64,
}

/// Numbering instance shared by every bullet list.
pub(crate) const BULLET_NUM_ID: u32 = 1;

/// Everything the serializer needs.
#[derive(Debug, Clone, Default)]
pub(crate) struct Content {
    pub blocks: Vec<Block>,
    pub hyperlinks: Vec<String>,
    pub ordered_lists: Vec<OrderedList>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct ListCtx {
    num_id: u32,
}

#[derive(Default)]
struct TableState {
    table: Option<Table>,
    row: Vec<Vec<Inline>>,
    cell: Option<Vec<Inline>>,
    in_head: bool,
}

#[derive(Default)]
struct Builder {
    content: Content,
    current: Option<Paragraph>,
    lists: Vec<ListCtx>,
    /// Set by `Start(Item)`, consumed by the item's first paragraph.
    pending_item: Option<ListRef>,
    quote_depth: u32,
    code_block: Option<String>,
    bold: u32,
    italic: u32,
    strike: u32,
    link: Option<usize>,
    table: TableState,
}

/// Parse Markdown into the block model.
pub(crate) fn build(markdown: &str) -> Content {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut builder = Builder::default();
    for event in Parser::new_ext(markdown, options) {
        builder.event(event);
    }
    builder.flush();
    builder.content
}

impl Builder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(buf) = self.code_block.as_mut() {
                    buf.push_str(&text);
                } else {
                    self.push_text(&text, false);
                }
            }
            Event::Code(text) => self.push_text(&text, true),
            Event::InlineMath(text) | Event::DisplayMath(text) => self.push_text(&text, false),
            Event::Html(html) | Event::InlineHtml(html) => {
                if is_line_break_tag(&html) {
                    self.push_inline(Inline::Break);
                }
            }
            Event::FootnoteReference(label) => self.push_text(&format!("[{label}]"), false),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_inline(Inline::Break),
            Event::Rule => {
                self.flush();
                let mut para = Paragraph::new(ParaStyle::Normal);
                para.rule = true;
                self.content.blocks.push(Block::Paragraph(para));
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "\u{2611} " } else { "\u{2610} " }, false);
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush();
                self.open(self.body_style());
            }
            Tag::Heading { level, .. } => {
                self.flush();
                self.open(ParaStyle::Heading(heading_number(level)));
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                let level = self.lists.len() as u32;
                let num_id = match start {
                    Some(start) => {
                        // Bullets own id 1; numbered lists follow
                        let num_id = BULLET_NUM_ID + 1 + self.content.ordered_lists.len() as u32;
                        self.content.ordered_lists.push(OrderedList {
                            num_id,
                            level,
                            start,
                        });
                        num_id
                    }
                    None => BULLET_NUM_ID,
                };
                self.lists.push(ListCtx { num_id });
            }
            Tag::Item => {
                self.flush();
                if let Some(ctx) = self.lists.last() {
                    self.pending_item = Some(ListRef {
                        num_id: ctx.num_id,
                        level: self.lists.len() as u32 - 1,
                    });
                }
            }
            Tag::Table(_) => {
                self.flush();
                self.table.table = Some(Table {
                    rows: Vec::new(),
                    header_rows: 0,
                });
            }
            Tag::TableHead => {
                self.table.in_head = true;
                self.table.row.clear();
            }
            Tag::TableRow => self.table.row.clear(),
            Tag::TableCell => self.table.cell = Some(Vec::new()),
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::Link { dest_url, .. } => {
                if is_external(&dest_url) {
                    self.content.hyperlinks.push(dest_url.to_string());
                    self.link = Some(self.content.hyperlinks.len() - 1);
                }
            }
            // Alt text is kept, in italics
            Tag::Image { .. } => self.italic += 1,
            Tag::HtmlBlock
            | Tag::FootnoteDefinition(_)
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::Superscript
            | Tag::Subscript
            | Tag::MetadataBlock(_) => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item => self.flush(),
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                let code = self.code_block.take().unwrap_or_default();
                let mut para = Paragraph::new(ParaStyle::Code);
                let code_format = RunFormat {
                    code: true,
                    ..RunFormat::default()
                };
                for (i, line) in code.trim_end_matches('\n').split('\n').enumerate() {
                    if i > 0 {
                        para.inlines.push(Inline::Break);
                    }
                    para.inlines.push(Inline::Text {
                        text: line.to_string(),
                        format: code_format,
                        link: None,
                    });
                }
                para.indent_twips = self.block_indent();
                self.content.blocks.push(Block::Paragraph(para));
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                self.pending_item = None;
            }
            TagEnd::TableCell => {
                let cell = self.table.cell.take().unwrap_or_default();
                self.table.row.push(cell);
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                let row = std::mem::take(&mut self.table.row);
                if let Some(table) = self.table.table.as_mut() {
                    table.rows.push(row);
                    if self.table.in_head {
                        table.header_rows += 1;
                    }
                }
                self.table.in_head = false;
            }
            TagEnd::Table => {
                if let Some(table) = self.table.table.take() {
                    self.content.blocks.push(Block::Table(table));
                }
            }
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::Link => self.link = None,
            TagEnd::Image => self.italic = self.italic.saturating_sub(1),
            TagEnd::HtmlBlock
            | TagEnd::FootnoteDefinition
            | TagEnd::DefinitionList
            | TagEnd::DefinitionListTitle
            | TagEnd::DefinitionListDefinition
            | TagEnd::Superscript
            | TagEnd::Subscript
            | TagEnd::MetadataBlock(_) => {}
        }
    }

    // -----------------------------------------------------------------------
    // Paragraph handling
    // -----------------------------------------------------------------------

    fn body_style(&self) -> ParaStyle {
        if self.quote_depth > 0 {
            ParaStyle::Quote
        } else if !self.lists.is_empty() {
            ParaStyle::ListParagraph
        } else {
            ParaStyle::Normal
        }
    }

    /// Indent for content nested in lists or quotes but not itself a list item.
    fn block_indent(&self) -> Option<u32> {
        let depth = self.lists.len() as u32 + self.quote_depth;
        (depth > 0).then_some(depth * INDENT_STEP_TWIPS)
    }

    fn open(&mut self, style: ParaStyle) {
        let mut para = Paragraph::new(style);
        match self.pending_item.take() {
            Some(list) => para.list = Some(list),
            None => para.indent_twips = self.block_indent(),
        }
        self.current = Some(para);
    }

    fn flush(&mut self) {
        if let Some(para) = self.current.take() {
            // Items whose only content was a nested list leave an empty paragraph
            if !para.inlines.is_empty() || para.list.is_some() {
                self.content.blocks.push(Block::Paragraph(para));
            }
        }
    }

    fn format(&self) -> RunFormat {
        RunFormat {
            bold: self.bold > 0 || self.table.in_head,
            italic: self.italic > 0 || self.quote_depth > 0,
            strike: self.strike > 0,
            code: false,
        }
    }

    fn push_text(&mut self, text: &str, code: bool) {
        let format = RunFormat {
            code,
            ..self.format()
        };
        self.push_inline(Inline::Text {
            text: text.to_string(),
            format,
            link: self.link,
        });
    }

    fn push_inline(&mut self, inline: Inline) {
        if let Some(cell) = self.table.cell.as_mut() {
            cell.push(inline);
            return;
        }
        if self.current.is_none() {
            self.open(self.body_style());
        }
        if let Some(para) = self.current.as_mut() {
            // Merge adjacent runs with identical formatting
            if let (
                Some(Inline::Text {
                    text: last,
                    format: last_format,
                    link: last_link,
                }),
                Inline::Text { text, format, link },
            ) = (para.inlines.last_mut(), &inline)
            {
                if last_format == format && last_link == link {
                    last.push_str(text);
                    return;
                }
            }
            para.inlines.push(inline);
        }
    }
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn is_external(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
}

fn is_line_break_tag(html: &str) -> bool {
    let compact: String = html
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(compact.as_str(), "<br>" | "<br/>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(content: &Content) -> Vec<&Paragraph> {
        content
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            })
            .collect()
    }

    #[test]
    fn headings_and_paragraphs() {
        let content = build("# Title\n\nSome **bold** text.\n\n## Section\n");
        let paras = paragraphs(&content);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0].style, ParaStyle::Heading(1));
        assert_eq!(paras[0].plain_text(), "Title");
        assert_eq!(paras[1].style, ParaStyle::Normal);
        assert_eq!(paras[1].plain_text(), "Some bold text.");
        assert!(matches!(
            &paras[1].inlines[1],
            Inline::Text { format: RunFormat { bold: true, .. }, .. }
        ));
        assert_eq!(paras[2].style, ParaStyle::Heading(2));
    }

    #[test]
    fn bullet_items_share_numbering() {
        let content = build("- one\n- two\n  - nested\n");
        let paras = paragraphs(&content);
        let lists: Vec<_> = paras.iter().map(|p| p.list).collect();
        assert_eq!(
            lists,
            vec![
                Some(ListRef { num_id: BULLET_NUM_ID, level: 0 }),
                Some(ListRef { num_id: BULLET_NUM_ID, level: 0 }),
                Some(ListRef { num_id: BULLET_NUM_ID, level: 1 }),
            ]
        );
        assert_eq!(paras[2].plain_text(), "nested");
        assert!(content.ordered_lists.is_empty());
    }

    #[test]
    fn each_numbered_list_gets_own_instance() {
        let content = build("1. a\n2. b\n\nText\n\n3. c\n4. d\n");
        assert_eq!(
            content.ordered_lists,
            vec![
                OrderedList { num_id: 2, level: 0, start: 1 },
                OrderedList { num_id: 3, level: 0, start: 3 },
            ]
        );
    }

    #[test]
    fn loose_item_second_paragraph_is_indented() {
        let content = build("- first\n\n  second para\n\n- next\n");
        let paras = paragraphs(&content);
        assert_eq!(paras.len(), 3);
        assert!(paras[0].list.is_some());
        assert_eq!(paras[1].list, None);
        assert_eq!(paras[1].indent_twips, Some(INDENT_STEP_TWIPS));
        assert!(paras[2].list.is_some());
    }

    #[test]
    fn code_block_lines_become_breaks() {
        let content = build("```rust\nfn main() {}\nlet x = 1;\n```\n");
        let paras = paragraphs(&content);
        assert_eq!(paras[0].style, ParaStyle::Code);
        assert_eq!(paras[0].plain_text(), "fn main() {}\nlet x = 1;");
    }

    #[test]
    fn quote_is_italic() {
        let content = build("> wise words\n");
        let paras = paragraphs(&content);
        assert_eq!(paras[0].style, ParaStyle::Quote);
        assert!(matches!(
            &paras[0].inlines[0],
            Inline::Text { format: RunFormat { italic: true, .. }, .. }
        ));
    }

    #[test]
    fn external_links_registered() {
        let content = build("See [docs](https://example.com/docs) and [here](#local).\n");
        assert_eq!(content.hyperlinks, vec!["https://example.com/docs".to_string()]);
        let paras = paragraphs(&content);
        assert!(paras[0].inlines.iter().any(|i| matches!(
            i,
            Inline::Text { link: Some(0), text, .. } if text == "docs"
        )));
    }

    #[test]
    fn html_dropped_except_br() {
        let content = build("line one<br>line two <span>x</span>\n");
        let paras = paragraphs(&content);
        assert_eq!(paras[0].plain_text(), "line one\nline two x");
    }

    #[test]
    fn tables_collected_with_header() {
        let content = build("| App | Price |\n|---|---|\n| Mint | Free |\n| YNAB | $14 |\n");
        let table = content
            .blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(t) => Some(t),
                Block::Paragraph(_) => None,
            })
            .expect("table block");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.header_rows, 1);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn rule_and_image_alt_text() {
        let content = build("![budget chart](chart.png)\n\n---\n");
        let paras = paragraphs(&content);
        assert_eq!(paras[0].plain_text(), "budget chart");
        assert!(paras[1].rule);
    }
}
