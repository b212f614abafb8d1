//! Shared types, error model, and configuration for SEOScribe.
//!
//! This crate is the foundation depended on by all other SEOScribe crates.
//! It provides:
//! - [`SeoScribeError`] — the unified error type
//! - Domain row types ([`KeywordRow`], [`TitleRow`], [`OutlineRow`])
//! - Configuration ([`AppConfig`], [`DocumentStyle`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DocumentStyle, MarkdownConfig, OpenAiConfig, RetryConfig,
    config_dir, config_file_path, init_config, init_config_at, load_config, load_config_from,
    resolve_api_key, validate_api_key,
};
pub use error::{Result, SeoScribeError};
pub use types::{KeywordRow, OutlineRow, TitleRow, normalize_serial};
