//! Prompts and batch pipelines for SEOScribe.
//!
//! This crate ties the keyword sheet, the chat client, Markdown cleanup and
//! document rendering together into end-to-end runs (e.g.,
//! [`write_articles`]).

pub mod naming;
pub mod pipeline;
pub mod prompts;

pub use naming::document_file_name;
pub use pipeline::{
    ArticleJob, BatchReport, OutlineJob, ProgressReporter, SilentProgress, render_markdown_file,
    write_articles, write_outline_articles, write_outlines,
};
