//! Styled `.docx` output for SEOScribe articles.
//!
//! [`render`] turns normalized Markdown into an [`ArticleDocument`]: headings
//! map to `Heading1`-`Heading6`, lists to Word numbering, and every style
//! carries the configured font, colour and sizes. The package is written
//! with `zip`; no template file is needed.

mod builder;
mod ooxml;

use std::io::{Cursor, Write};
use std::path::Path;

use tracing::{debug, instrument};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use seoscribe_shared::{DocumentStyle, Result, SeoScribeError};

use builder::{Block, Content, ParaStyle};

/// A rendered article, ready to be packed or saved.
#[derive(Debug, Clone)]
pub struct ArticleDocument {
    content: Content,
    style: DocumentStyle,
    title: Option<String>,
}

/// Render Markdown into a styled document.
#[instrument(skip_all, fields(bytes = markdown.len()))]
pub fn render(markdown: &str, style: &DocumentStyle) -> ArticleDocument {
    let content = builder::build(markdown);
    let title = content.blocks.iter().find_map(|block| match block {
        Block::Paragraph(p) if p.style == ParaStyle::Heading(1) => {
            Some(p.plain_text().trim().to_string()).filter(|t| !t.is_empty())
        }
        _ => None,
    });

    debug!(
        blocks = content.blocks.len(),
        links = content.hyperlinks.len(),
        "document rendered"
    );

    ArticleDocument {
        content,
        style: style.clone(),
        title,
    }
}

impl ArticleDocument {
    /// Text of the first level-1 heading.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Number of paragraphs in the body, table cells excluded.
    pub fn paragraph_count(&self) -> usize {
        self.content
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Paragraph(_)))
            .count()
    }

    /// Pack the document into `.docx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let parts = [
            ("[Content_Types].xml", ooxml::content_types()),
            ("_rels/.rels", ooxml::package_rels()),
            ("docProps/core.xml", ooxml::core_properties(self.title())),
            ("word/document.xml", ooxml::document(&self.content)),
            ("word/styles.xml", ooxml::styles(&self.style)),
            ("word/numbering.xml", ooxml::numbering(&self.content.ordered_lists)),
            (
                "word/_rels/document.xml.rels",
                ooxml::document_rels(&self.content.hyperlinks),
            ),
        ];

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, xml) in parts {
            zip.start_file(name, options)
                .map_err(|e| SeoScribeError::Document(format!("{name}: {e}")))?;
            zip.write_all(xml.as_bytes())
                .map_err(|e| SeoScribeError::Document(format!("{name}: {e}")))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| SeoScribeError::Document(format!("failed to finish package: {e}")))?;
        Ok(cursor.into_inner())
    }

    /// Write the document to `path`, creating parent directories.
    ///
    /// The bytes go to a hidden temp file in the same directory first and
    /// are renamed into place, so a reader never sees a partial file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| SeoScribeError::io(dir, e))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| SeoScribeError::validation(format!("not a file path: {}", path.display())))?;
        let temp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

        std::fs::write(&temp, &bytes).map_err(|e| SeoScribeError::io(&temp, e))?;
        std::fs::rename(&temp, path).map_err(|e| SeoScribeError::io(path, e))?;

        debug!(size = bytes.len(), "wrote document");
        Ok(())
    }
}
