//! WordprocessingML part serialization.
//!
//! Produces the XML parts of a minimal `.docx` package: content types,
//! package and document relationships, core properties, styles, numbering
//! and the document body.

use std::fmt::Write as _;

use seoscribe_shared::DocumentStyle;

use crate::builder::{
    BULLET_NUM_ID, Block, Content, INDENT_STEP_TWIPS, Inline, OrderedList, Paragraph, ParaStyle,
    RunFormat, Table,
};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Monospace face for inline code and code blocks.
const CODE_FONT: &str = "Courier New";

/// Text width of a Letter page with one-inch margins, in twips.
const TEXT_WIDTH_TWIPS: u32 = 9360;

/// Bullet glyphs, cycled by nesting level.
const BULLET_GLYPHS: [&str; 3] = ["\u{2022}", "\u{25e6}", "\u{25aa}"];

/// Number formats, cycled by nesting level.
const NUMBER_FORMATS: [&str; 3] = ["decimal", "lowerLetter", "lowerRoman"];

/// Relationship id of the first hyperlink; styles and numbering come first.
const FIRST_LINK_REL: usize = 3;

// ---------------------------------------------------------------------------
// Package plumbing
// ---------------------------------------------------------------------------

pub(crate) fn content_types() -> String {
    format!(
        "{XML_DECL}\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
<Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>\
<Override PartName=\"/word/numbering.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
</Types>"
    )
}

pub(crate) fn package_rels() -> String {
    format!(
        "{XML_DECL}\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"{REL_BASE}/officeDocument\" Target=\"word/document.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
</Relationships>"
    )
}

pub(crate) fn core_properties(title: Option<&str>) -> String {
    let mut xml = format!(
        "{XML_DECL}\
<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
xmlns:dcterms=\"http://purl.org/dc/terms/\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">"
    );
    if let Some(title) = title {
        let _ = write!(xml, "<dc:title>{}</dc:title>", escape(title));
    }
    xml.push_str(concat!(
        "<dc:creator>SEOScribe ",
        env!("CARGO_PKG_VERSION"),
        "</dc:creator></cp:coreProperties>"
    ));
    xml
}

pub(crate) fn document_rels(hyperlinks: &[String]) -> String {
    let mut xml = format!(
        "{XML_DECL}\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"{REL_BASE}/styles\" Target=\"styles.xml\"/>\
<Relationship Id=\"rId2\" Type=\"{REL_BASE}/numbering\" Target=\"numbering.xml\"/>"
    );
    for (i, url) in hyperlinks.iter().enumerate() {
        let _ = write!(
            xml,
            "<Relationship Id=\"{}\" Type=\"{REL_BASE}/hyperlink\" Target=\"{}\" TargetMode=\"External\"/>",
            link_rel_id(i),
            escape(url)
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn link_rel_id(index: usize) -> String {
    format!("rId{}", FIRST_LINK_REL + index)
}

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

/// `styles.xml`: defaults plus Normal, Heading1-6, Quote, CodeBlock,
/// ListParagraph, Hyperlink and TableGrid.
pub(crate) fn styles(style: &DocumentStyle) -> String {
    let font = escape(&style.font);
    let color = &style.color;
    let body_sz = style.body_size_pt * 2;

    let mut xml = format!(
        "{XML_DECL}<w:styles xmlns:w=\"{NS_W}\">\
<w:docDefaults><w:rPrDefault><w:rPr>\
<w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:eastAsia=\"{font}\" w:cs=\"{font}\"/>\
<w:color w:val=\"{color}\"/><w:sz w:val=\"{body_sz}\"/><w:szCs w:val=\"{body_sz}\"/>\
</w:rPr></w:rPrDefault>\
<w:pPrDefault><w:pPr><w:spacing w:after=\"160\" w:line=\"276\" w:lineRule=\"auto\"/></w:pPr></w:pPrDefault>\
</w:docDefaults>\
<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/><w:qFormat/>\
<w:rPr><w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:cs=\"{font}\"/><w:color w:val=\"{color}\"/>\
<w:sz w:val=\"{body_sz}\"/><w:szCs w:val=\"{body_sz}\"/></w:rPr></w:style>"
    );

    for level in 1..=6u8 {
        let sz = style.heading_size_pt(level) * 2;
        let _ = write!(
            xml,
            "<w:style w:type=\"paragraph\" w:styleId=\"Heading{level}\">\
<w:name w:val=\"heading {level}\"/><w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/><w:qFormat/>\
<w:pPr><w:keepNext/><w:spacing w:before=\"240\" w:after=\"120\"/><w:outlineLvl w:val=\"{}\"/></w:pPr>\
<w:rPr><w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:cs=\"{font}\"/><w:b/><w:bCs/>\
<w:color w:val=\"{color}\"/><w:sz w:val=\"{sz}\"/><w:szCs w:val=\"{sz}\"/></w:rPr></w:style>",
            level - 1
        );
    }

    let _ = write!(
        xml,
        "<w:style w:type=\"paragraph\" w:styleId=\"Quote\"><w:name w:val=\"Quote\"/>\
<w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/><w:qFormat/>\
<w:pPr><w:ind w:left=\"{INDENT_STEP_TWIPS}\" w:right=\"{INDENT_STEP_TWIPS}\"/></w:pPr>\
<w:rPr><w:i/><w:iCs/><w:color w:val=\"{color}\"/><w:sz w:val=\"{body_sz}\"/></w:rPr></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"CodeBlock\"><w:name w:val=\"Code Block\"/>\
<w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/>\
<w:pPr><w:spacing w:after=\"0\" w:line=\"240\" w:lineRule=\"auto\"/></w:pPr>\
<w:rPr><w:rFonts w:ascii=\"{CODE_FONT}\" w:hAnsi=\"{CODE_FONT}\" w:cs=\"{CODE_FONT}\"/>\
<w:color w:val=\"{color}\"/><w:sz w:val=\"{body_sz}\"/></w:rPr></w:style>\
<w:style w:type=\"paragraph\" w:styleId=\"ListParagraph\"><w:name w:val=\"List Paragraph\"/>\
<w:basedOn w:val=\"Normal\"/><w:qFormat/>\
<w:pPr><w:spacing w:after=\"60\"/><w:ind w:left=\"{INDENT_STEP_TWIPS}\"/><w:contextualSpacing/></w:pPr>\
<w:rPr><w:color w:val=\"{color}\"/><w:sz w:val=\"{body_sz}\"/></w:rPr></w:style>\
<w:style w:type=\"character\" w:styleId=\"Hyperlink\"><w:name w:val=\"Hyperlink\"/>\
<w:rPr><w:color w:val=\"{color}\"/><w:u w:val=\"single\"/></w:rPr></w:style>\
<w:style w:type=\"table\" w:styleId=\"TableGrid\"><w:name w:val=\"Table Grid\"/>\
<w:tblPr><w:tblBorders>\
<w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"{color}\"/>\
<w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"{color}\"/>\
<w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"{color}\"/>\
<w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"{color}\"/>\
<w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"{color}\"/>\
<w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"{color}\"/>\
</w:tblBorders></w:tblPr></w:style>\
</w:styles>"
    );
    xml
}

// ---------------------------------------------------------------------------
// Numbering
// ---------------------------------------------------------------------------

const BULLET_ABSTRACT_ID: u32 = 0;
const DECIMAL_ABSTRACT_ID: u32 = 1;

/// `numbering.xml`: one bullet definition shared by all bullet lists and one
/// `w:num` per numbered list so each restarts at its own start value.
pub(crate) fn numbering(ordered_lists: &[OrderedList]) -> String {
    let mut xml = format!("{XML_DECL}<w:numbering xmlns:w=\"{NS_W}\">");

    let _ = write!(
        xml,
        "<w:abstractNum w:abstractNumId=\"{BULLET_ABSTRACT_ID}\"><w:multiLevelType w:val=\"hybridMultilevel\"/>"
    );
    for level in 0..9u32 {
        let glyph = BULLET_GLYPHS[level as usize % BULLET_GLYPHS.len()];
        push_level(&mut xml, level, "bullet", glyph);
    }
    xml.push_str("</w:abstractNum>");

    let _ = write!(
        xml,
        "<w:abstractNum w:abstractNumId=\"{DECIMAL_ABSTRACT_ID}\"><w:multiLevelType w:val=\"hybridMultilevel\"/>"
    );
    for level in 0..9u32 {
        let format = NUMBER_FORMATS[level as usize % NUMBER_FORMATS.len()];
        push_level(&mut xml, level, format, &format!("%{}.", level + 1));
    }
    xml.push_str("</w:abstractNum>");

    let _ = write!(
        xml,
        "<w:num w:numId=\"{BULLET_NUM_ID}\"><w:abstractNumId w:val=\"{BULLET_ABSTRACT_ID}\"/></w:num>"
    );
    for list in ordered_lists {
        let _ = write!(
            xml,
            "<w:num w:numId=\"{}\"><w:abstractNumId w:val=\"{DECIMAL_ABSTRACT_ID}\"/>\
<w:lvlOverride w:ilvl=\"{}\"><w:startOverride w:val=\"{}\"/></w:lvlOverride></w:num>",
            list.num_id, list.level, list.start
        );
    }

    xml.push_str("</w:numbering>");
    xml
}

fn push_level(xml: &mut String, level: u32, format: &str, text: &str) {
    let left = INDENT_STEP_TWIPS * (level + 1);
    let _ = write!(
        xml,
        "<w:lvl w:ilvl=\"{level}\"><w:start w:val=\"1\"/><w:numFmt w:val=\"{format}\"/>\
<w:lvlText w:val=\"{}\"/><w:lvlJc w:val=\"left\"/>\
<w:pPr><w:ind w:left=\"{left}\" w:hanging=\"360\"/></w:pPr></w:lvl>",
        escape(text)
    );
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// `document.xml` with every block in order and a Letter-size section.
pub(crate) fn document(content: &Content) -> String {
    let mut xml = format!(
        "{XML_DECL}<w:document xmlns:w=\"{NS_W}\" xmlns:r=\"{NS_R}\"><w:body>"
    );

    for block in &content.blocks {
        match block {
            Block::Paragraph(para) => push_paragraph(&mut xml, para),
            Block::Table(table) => push_table(&mut xml, table),
        }
    }

    xml.push_str(
        "<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/>\
<w:pgMar w:top=\"1440\" w:right=\"1440\" w:bottom=\"1440\" w:left=\"1440\" w:header=\"720\" w:footer=\"720\" w:gutter=\"0\"/>\
</w:sectPr></w:body></w:document>",
    );
    xml
}

fn push_paragraph(xml: &mut String, para: &Paragraph) {
    xml.push_str("<w:p><w:pPr>");
    if para.style != ParaStyle::Normal {
        let _ = write!(xml, "<w:pStyle w:val=\"{}\"/>", para.style.style_id());
    }
    if let Some(list) = para.list {
        let _ = write!(
            xml,
            "<w:numPr><w:ilvl w:val=\"{}\"/><w:numId w:val=\"{}\"/></w:numPr>",
            list.level, list.num_id
        );
    }
    if para.rule {
        xml.push_str(
            "<w:pBdr><w:bottom w:val=\"single\" w:sz=\"6\" w:space=\"1\" w:color=\"auto\"/></w:pBdr>",
        );
    }
    if let Some(left) = para.indent_twips {
        let _ = write!(xml, "<w:ind w:left=\"{left}\"/>");
    }
    xml.push_str("</w:pPr>");
    push_inlines(xml, &para.inlines);
    xml.push_str("</w:p>");
}

fn push_inlines(xml: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Break => xml.push_str("<w:r><w:br/></w:r>"),
            Inline::Text { text, format, link } => match link {
                Some(index) => {
                    let _ = write!(
                        xml,
                        "<w:hyperlink r:id=\"{}\" w:history=\"1\">",
                        link_rel_id(*index)
                    );
                    push_run(xml, text, format, true);
                    xml.push_str("</w:hyperlink>");
                }
                None => push_run(xml, text, format, false),
            },
        }
    }
}

fn push_run(xml: &mut String, text: &str, format: &RunFormat, hyperlink: bool) {
    xml.push_str("<w:r>");
    let has_props = hyperlink || format.code || format.bold || format.italic || format.strike;
    if has_props {
        xml.push_str("<w:rPr>");
        if hyperlink {
            xml.push_str("<w:rStyle w:val=\"Hyperlink\"/>");
        }
        if format.code {
            let _ = write!(
                xml,
                "<w:rFonts w:ascii=\"{CODE_FONT}\" w:hAnsi=\"{CODE_FONT}\" w:cs=\"{CODE_FONT}\"/>"
            );
        }
        if format.bold {
            xml.push_str("<w:b/><w:bCs/>");
        }
        if format.italic {
            xml.push_str("<w:i/><w:iCs/>");
        }
        if format.strike {
            xml.push_str("<w:strike/>");
        }
        xml.push_str("</w:rPr>");
    }
    let _ = write!(xml, "<w:t xml:space=\"preserve\">{}</w:t></w:r>", escape(text));
}

fn push_table(xml: &mut String, table: &Table) {
    let columns = table.column_count().max(1);
    let col_width = TEXT_WIDTH_TWIPS / columns as u32;

    xml.push_str(
        "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr><w:tblGrid>",
    );
    for _ in 0..columns {
        let _ = write!(xml, "<w:gridCol w:w=\"{col_width}\"/>");
    }
    xml.push_str("</w:tblGrid>");

    for (row_index, row) in table.rows.iter().enumerate() {
        xml.push_str("<w:tr>");
        if row_index < table.header_rows {
            xml.push_str("<w:trPr><w:tblHeader/></w:trPr>");
        }
        for col in 0..columns {
            let _ = write!(
                xml,
                "<w:tc><w:tcPr><w:tcW w:w=\"{col_width}\" w:type=\"dxa\"/></w:tcPr><w:p>"
            );
            if let Some(cell) = row.get(col) {
                push_inlines(xml, cell);
            }
            xml.push_str("</w:p></w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Escape XML markup characters and drop characters XML 1.0 cannot carry.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{fffe}' || c == '\u{ffff}' => {}
            c => out.push(c),
        }
    }
    out
}
