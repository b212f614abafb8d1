//! Application configuration for SEOScribe.
//!
//! User config lives at `~/.seoscribe/seoscribe.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SeoScribeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "seoscribe.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".seoscribe";

// ---------------------------------------------------------------------------
// Config structs (matching seoscribe.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output locations.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Chat API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Resubmission policy for failed chat calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Markdown normalization switches.
    #[serde(default)]
    pub markdown: MarkdownConfig,

    /// Output document styling.
    #[serde(default)]
    pub document: DocumentStyle,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Keyword spreadsheet read by the article and outline runs.
    #[serde(default = "default_input_file")]
    pub input_file: String,

    /// Where article documents are written.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    /// Where the outline sheet and outline-based documents are written.
    #[serde(default = "default_outlines_dir")]
    pub outlines_dir: String,

    /// File name of the outline sheet inside `outlines_dir`.
    #[serde(default = "default_outlines_file")]
    pub outlines_file: String,

    /// Keep the raw model reply as a `.md` file next to each document.
    #[serde(default = "default_true")]
    pub debug_markdown: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            documents_dir: default_documents_dir(),
            outlines_dir: default_outlines_dir(),
            outlines_file: default_outlines_file(),
            debug_markdown: true,
        }
    }
}

fn default_input_file() -> String {
    "keywords.csv".into()
}
fn default_documents_dir() -> String {
    "documents".into()
}
fn default_outlines_dir() -> String {
    "outlines".into()
}
fn default_outlines_file() -> String {
    "outlines.csv".into()
}
fn default_true() -> bool {
    true
}

impl DefaultsConfig {
    /// Full path of the outline sheet.
    pub fn outlines_path(&self) -> PathBuf {
        Path::new(&self.outlines_dir).join(&self.outlines_file)
    }
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API (the `/chat/completions` path is appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Optional completion length cap. Unset lets the API decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}

impl OpenAiConfig {
    /// Parse the configured base URL.
    pub fn parsed_base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            SeoScribeError::config(format!("invalid openai.base_url '{}': {e}", self.base_url))
        })
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the randomized wait between attempts.
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: u64,

    /// Upper bound of the randomized wait between attempts.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_wait_secs: default_min_wait_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}
fn default_min_wait_secs() -> u64 {
    1
}
fn default_max_wait_secs() -> u64 {
    60
}

/// `[markdown]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Collapse every sub-heading (H2 to H6) to H2.
    #[serde(default = "default_true")]
    pub flatten_subheadings: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            flatten_subheadings: true,
        }
    }
}

/// `[document]` section: fonts, sizes and colour of the generated documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStyle {
    /// Font family applied to every style.
    #[serde(default = "default_font")]
    pub font: String,

    /// Text colour as six hex digits (`RRGGBB`).
    #[serde(default = "default_color")]
    pub color: String,

    /// Body text size in points.
    #[serde(default = "default_body_size")]
    pub body_size_pt: u32,

    /// Heading 1, 2 and 3 sizes in points. Deeper headings use the body size.
    #[serde(default = "default_heading_sizes")]
    pub heading_sizes_pt: Vec<u32>,
}

impl Default for DocumentStyle {
    fn default() -> Self {
        Self {
            font: default_font(),
            color: default_color(),
            body_size_pt: default_body_size(),
            heading_sizes_pt: default_heading_sizes(),
        }
    }
}

fn default_font() -> String {
    "Arial".into()
}
fn default_color() -> String {
    "000000".into()
}
fn default_body_size() -> u32 {
    13
}
fn default_heading_sizes() -> Vec<u32> {
    vec![20, 18, 16]
}

impl DocumentStyle {
    /// Point size for a heading level (1-based).
    pub fn heading_size_pt(&self, level: u8) -> u32 {
        usize::from(level)
            .checked_sub(1)
            .and_then(|i| self.heading_sizes_pt.get(i))
            .copied()
            .unwrap_or(self.body_size_pt)
    }

    /// Check the colour is a usable `RRGGBB` value and sizes are non-zero.
    pub fn validate(&self) -> Result<()> {
        let hex_ok = self.color.len() == 6 && self.color.chars().all(|c| c.is_ascii_hexdigit());
        if !hex_ok {
            return Err(SeoScribeError::config(format!(
                "document.color must be six hex digits, got '{}'",
                self.color
            )));
        }
        if self.body_size_pt == 0 || self.heading_sizes_pt.contains(&0) {
            return Err(SeoScribeError::config("document font sizes must be non-zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.seoscribe/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SeoScribeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.seoscribe/seoscribe.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SeoScribeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SeoScribeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.document.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| SeoScribeError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SeoScribeError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| SeoScribeError::io(path, e))?;
    tracing::info!(?path, "created default config file");
    Ok(())
}

/// Read the API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(SeoScribeError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://platform.openai.com/api-keys"
        ))),
    }
}

/// Check that the API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("documents_dir"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("gpt-3.5-turbo"));
        // Unset max_tokens is omitted rather than written as an empty value
        assert!(!toml_str.contains("max_tokens"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.retry.max_attempts, 10);
        assert_eq!(parsed.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(parsed.document, DocumentStyle::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[openai]
model = "gpt-4o-mini"
max_tokens = 4096

[document]
font = "Calibri"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.max_tokens, Some(4096));
        assert!((config.openai.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.document.font, "Calibri");
        assert_eq!(config.document.body_size_pt, 13);
        assert_eq!(config.defaults.input_file, "keywords.csv");
        assert!(config.markdown.flatten_subheadings);
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("seoscribe.toml");
        std::fs::write(&path, "[defaults]\ndocuments_dir = \"out\"\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.defaults.documents_dir, "out");
        assert_eq!(
            config.defaults.outlines_path(),
            Path::new("outlines").join("outlines.csv")
        );
    }

    #[test]
    fn init_config_at_writes_loadable_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("seoscribe.toml");

        init_config_at(&path).expect("init");
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.openai.model, "gpt-3.5-turbo");
        assert_eq!(config.document, DocumentStyle::default());
    }

    #[test]
    fn load_config_rejects_bad_color() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("seoscribe.toml");
        std::fs::write(&path, "[document]\ncolor = \"black\"\n").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("six hex digits"));
    }

    #[test]
    fn heading_sizes_fall_back_to_body() {
        let style = DocumentStyle::default();
        assert_eq!(style.heading_size_pt(1), 20);
        assert_eq!(style.heading_size_pt(2), 18);
        assert_eq!(style.heading_size_pt(3), 16);
        assert_eq!(style.heading_size_pt(4), 13);
        assert_eq!(style.heading_size_pt(0), 13);
    }

    #[test]
    fn base_url_parsing() {
        let mut openai = OpenAiConfig::default();
        assert_eq!(
            openai.parsed_base_url().unwrap().as_str(),
            "https://api.openai.com/v1"
        );
        openai.base_url = "not a url".into();
        assert!(openai.parsed_base_url().is_err());
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openai.api_key_env = "SEOSCRIBE_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
