//! Batch pipelines: keyword sheet → completion → cleanup → document.
//!
//! Three runs are offered. [`write_articles`] produces a document per
//! keyword in one request, [`write_outlines`] stores an outline per keyword
//! in a sheet, and [`write_outline_articles`] expands that sheet into
//! documents. Rows are handled one after another; a row whose completion
//! fails is recorded in the report and the batch moves on.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use seoscribe_document::ArticleDocument;
use seoscribe_llm::{ChatMessage, Completion, CompletionProvider};
use seoscribe_markdown::NormalizeOptions;
use seoscribe_shared::{AppConfig, DocumentStyle, OutlineRow, Result, SeoScribeError};

use crate::naming::{debug_markdown_file_name, document_file_name};
use crate::prompts;

/// Settings for a run that ends in documents.
#[derive(Debug, Clone)]
pub struct ArticleJob {
    /// Sheet to read rows from.
    pub input: PathBuf,
    /// Directory the documents are written to.
    pub output_dir: PathBuf,
    /// Keep the raw reply as a `.md` next to each document.
    pub debug_markdown: bool,
    pub normalize: NormalizeOptions,
    pub style: DocumentStyle,
}

impl ArticleJob {
    /// Keyword sheet in, documents under `documents_dir`.
    pub fn articles(config: &AppConfig) -> Self {
        Self {
            input: PathBuf::from(&config.defaults.input_file),
            output_dir: PathBuf::from(&config.defaults.documents_dir),
            debug_markdown: config.defaults.debug_markdown,
            normalize: NormalizeOptions::from(&config.markdown),
            style: config.document.clone(),
        }
    }

    /// Outline sheet in, documents under `outlines_dir`.
    pub fn outline_articles(config: &AppConfig) -> Self {
        Self {
            input: config.defaults.outlines_path(),
            output_dir: PathBuf::from(&config.defaults.outlines_dir),
            ..Self::articles(config)
        }
    }
}

/// Settings for an outline run.
#[derive(Debug, Clone)]
pub struct OutlineJob {
    /// Keyword sheet to read.
    pub input: PathBuf,
    /// Outline sheet to (re)create.
    pub output: PathBuf,
}

impl OutlineJob {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            input: PathBuf::from(&config.defaults.input_file),
            output: config.defaults.outlines_path(),
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Rows that produced output.
    pub processed: usize,
    /// `(serial, error)` for each row that did not.
    pub failed: Vec<(String, String)>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub elapsed: Duration,
    /// Files written, in row order.
    pub outputs: Vec<PathBuf>,
}

impl BatchReport {
    /// Rows attempted.
    pub fn total(&self) -> usize {
        self.processed + self.failed.len()
    }

    fn record_usage(&mut self, completion: &Completion) {
        self.tokens_in += completion.tokens_in;
        self.tokens_out += completion.tokens_out;
    }

    fn record_failure(&mut self, serial: &str, err: &SeoScribeError) {
        self.failed.push((serial.to_string(), err.to_string()));
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a row's request is sent.
    fn row_started(&self, current: usize, total: usize, label: &str);
    /// Called once a row is written or has failed.
    fn row_finished(&self, current: usize, total: usize, ok: bool);
    /// Called when the pipeline completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_started(&self, _current: usize, _total: usize, _label: &str) {}
    fn row_finished(&self, _current: usize, _total: usize, _ok: bool) {}
    fn done(&self, _report: &BatchReport) {}
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// Write one article document per keyword row.
#[instrument(skip_all, fields(input = %job.input.display(), model = provider.model()))]
pub async fn write_articles<P: CompletionProvider>(
    provider: &P,
    job: &ArticleJob,
    progress: &dyn ProgressReporter,
) -> Result<BatchReport> {
    let start = Instant::now();

    // --- Phase 1: Read keywords ---
    progress.phase("Reading keywords");
    let rows = seoscribe_sheet::read_keywords(&job.input)?;
    let rows: Vec<(String, String, Vec<ChatMessage>)> = rows
        .into_iter()
        .map(|row| {
            let messages = prompts::article_messages(&row.keyword);
            (row.serial, row.keyword, messages)
        })
        .collect();

    // --- Phase 2: Generate ---
    let report = generate_documents(provider, job, &rows, progress, start).await?;
    progress.done(&report);
    Ok(report)
}

/// Expand each stored outline into an article document.
#[instrument(skip_all, fields(input = %job.input.display(), model = provider.model()))]
pub async fn write_outline_articles<P: CompletionProvider>(
    provider: &P,
    job: &ArticleJob,
    progress: &dyn ProgressReporter,
) -> Result<BatchReport> {
    let start = Instant::now();

    // --- Phase 1: Read outlines ---
    progress.phase("Reading outlines");
    let rows = seoscribe_sheet::read_outlines(&job.input)?;
    let rows: Vec<(String, String, Vec<ChatMessage>)> = rows
        .into_iter()
        .map(|row| {
            let messages = prompts::outline_article_messages(&row.outline);
            (row.serial, row.keyword, messages)
        })
        .collect();

    // --- Phase 2: Generate ---
    let report = generate_documents(provider, job, &rows, progress, start).await?;
    progress.done(&report);
    Ok(report)
}

async fn generate_documents<P: CompletionProvider>(
    provider: &P,
    job: &ArticleJob,
    rows: &[(String, String, Vec<ChatMessage>)],
    progress: &dyn ProgressReporter,
    start: Instant,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    if rows.is_empty() {
        warn!(input = %job.input.display(), "no rows to process");
        report.elapsed = start.elapsed();
        return Ok(report);
    }

    std::fs::create_dir_all(&job.output_dir).map_err(|e| SeoScribeError::io(&job.output_dir, e))?;

    progress.phase("Generating articles");
    let total = rows.len();
    for (i, (serial, keyword, messages)) in rows.iter().enumerate() {
        let current = i + 1;
        progress.row_started(current, total, keyword);

        let completion = match provider.complete(messages).await {
            Ok(c) => c,
            Err(e) => {
                error!(serial = %serial, keyword = %keyword, error = %e, "row failed");
                report.record_failure(serial, &e);
                progress.row_finished(current, total, false);
                continue;
            }
        };
        report.record_usage(&completion);

        let path = write_document(job, serial, keyword, &completion.text)?;
        info!(
            serial = %serial,
            path = %path.display(),
            tokens_out = completion.tokens_out,
            "document written"
        );
        report.outputs.push(path);
        report.processed += 1;
        progress.row_finished(current, total, true);
    }

    report.elapsed = start.elapsed();
    info!(
        processed = report.processed,
        failed = report.failed.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "batch complete"
    );
    Ok(report)
}

fn write_document(job: &ArticleJob, serial: &str, keyword: &str, reply: &str) -> Result<PathBuf> {
    if job.debug_markdown {
        let md_path = job.output_dir.join(debug_markdown_file_name(serial, keyword));
        std::fs::write(&md_path, reply).map_err(|e| SeoScribeError::io(&md_path, e))?;
    }

    let markdown = seoscribe_markdown::normalize(reply, &job.normalize);
    let path = job.output_dir.join(document_file_name(serial, keyword));
    seoscribe_document::render(&markdown, &job.style).save(&path)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Outlines
// ---------------------------------------------------------------------------

/// Request an outline per keyword and store them in the outline sheet.
///
/// The sheet is recreated at the start of the run and each row is flushed
/// as soon as it arrives.
#[instrument(skip_all, fields(input = %job.input.display(), model = provider.model()))]
pub async fn write_outlines<P: CompletionProvider>(
    provider: &P,
    job: &OutlineJob,
    progress: &dyn ProgressReporter,
) -> Result<BatchReport> {
    let start = Instant::now();
    let mut report = BatchReport::default();

    // --- Phase 1: Read keywords ---
    progress.phase("Reading keywords");
    let rows = seoscribe_sheet::read_keywords(&job.input)?;
    if rows.is_empty() {
        warn!(input = %job.input.display(), "no rows to process");
    }

    // --- Phase 2: Generate outlines ---
    progress.phase("Generating outlines");
    let mut writer = seoscribe_sheet::OutlineWriter::create(&job.output)?;
    let total = rows.len();
    for (i, row) in rows.into_iter().enumerate() {
        let current = i + 1;
        progress.row_started(current, total, &row.keyword);

        let messages = prompts::outline_messages(&row.keyword);
        let completion = match provider.complete(&messages).await {
            Ok(c) => c,
            Err(e) => {
                error!(serial = %row.serial, keyword = %row.keyword, error = %e, "row failed");
                report.record_failure(&row.serial, &e);
                progress.row_finished(current, total, false);
                continue;
            }
        };
        report.record_usage(&completion);

        let outline = seoscribe_markdown::clean_outline(&completion.text);
        writer.append(&OutlineRow::new(row.serial, row.keyword, outline))?;
        report.processed += 1;
        progress.row_finished(current, total, true);
    }

    report.outputs.push(writer.path().to_path_buf());
    report.elapsed = start.elapsed();
    info!(
        rows = writer.rows_written(),
        failed = report.failed.len(),
        path = %writer.path().display(),
        "outline sheet written"
    );
    progress.done(&report);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Offline
// ---------------------------------------------------------------------------

/// Normalize an existing Markdown file and save it as a document.
#[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn render_markdown_file(
    input: &Path,
    output: &Path,
    options: &NormalizeOptions,
    style: &DocumentStyle,
) -> Result<ArticleDocument> {
    let raw = std::fs::read(input).map_err(|e| SeoScribeError::io(input, e))?;
    let markdown = seoscribe_markdown::normalize(&String::from_utf8_lossy(&raw), options);
    let document = seoscribe_document::render(&markdown, style);
    document.save(output)?;
    info!(title = ?document.title(), "document written");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use seoscribe_llm::Role;

    use super::*;

    /// Replies with canned results in order and records each request.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SeoScribeError::Generation("script exhausted".into())))?;
            Ok(Completion {
                text: reply,
                role: Role::Assistant,
                model: "scripted".into(),
                tokens_in: 10,
                tokens_out: 100,
                latency_ms: 1,
            })
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    const ARTICLE: &str = "```markdown\n# Budget Apps\n\n## Introduction\n\nApps help.\n\n\
**Q: Are they free?**\nA: Many are.\n```";

    fn job(dir: &Path, input: PathBuf) -> ArticleJob {
        ArticleJob {
            input,
            output_dir: dir.join("documents"),
            debug_markdown: true,
            normalize: NormalizeOptions::default(),
            style: DocumentStyle::default(),
        }
    }

    fn keyword_sheet(dir: &Path) -> PathBuf {
        let path = dir.join("keywords.csv");
        std::fs::write(&path, "SL,Keywords\n1,budget apps\n2,24/7 banking\n3,index funds\n").unwrap();
        path
    }

    #[tokio::test]
    async fn articles_written_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), keyword_sheet(dir.path()));
        let provider = ScriptedProvider::new(vec![
            Ok(ARTICLE.into()),
            Ok(ARTICLE.into()),
            Ok(ARTICLE.into()),
        ]);

        let report = write_articles(&provider, &job, &SilentProgress).await.unwrap();

        assert_eq!(report.processed, 3);
        assert!(report.failed.is_empty());
        assert_eq!(report.tokens_in, 30);
        assert_eq!(report.tokens_out, 300);

        let docs = dir.path().join("documents");
        assert!(docs.join("1. budget apps.docx").exists());
        assert!(docs.join("2. 24.7 banking.docx").exists());
        assert_eq!(report.outputs[2], docs.join("3. index funds.docx"));

        let raw = std::fs::read_to_string(docs.join("1. budget apps.md")).unwrap();
        assert_eq!(raw, ARTICLE);

        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[1][1].content.contains("\"24/7 banking\""));
    }

    #[tokio::test]
    async fn failed_row_is_recorded_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), keyword_sheet(dir.path()));
        job.debug_markdown = false;
        let provider = ScriptedProvider::new(vec![
            Ok(ARTICLE.into()),
            Err(SeoScribeError::Api {
                status: 401,
                message: "bad key".into(),
            }),
            Ok(ARTICLE.into()),
        ]);

        let report = write_articles(&provider, &job, &SilentProgress).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.total(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "2");
        assert!(report.failed[0].1.contains("bad key"));

        let docs = dir.path().join("documents");
        assert!(!docs.join("2. 24.7 banking.docx").exists());
        assert!(docs.join("3. index funds.docx").exists());
        assert!(!docs.join("1. budget apps.md").exists());
    }

    #[tokio::test]
    async fn path_like_serial_stays_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("keywords.csv");
        std::fs::write(&input, "SL,Keywords\n../escape,budget apps\n").unwrap();
        let job = job(dir.path(), input);
        let provider = ScriptedProvider::new(vec![Ok(ARTICLE.into())]);

        let report = write_articles(&provider, &job, &SilentProgress).await.unwrap();

        let docs = dir.path().join("documents");
        assert_eq!(report.outputs, vec![docs.join("...escape. budget apps.docx")]);
        assert!(docs.join("...escape. budget apps.md").exists());
        assert!(!dir.path().join("escape. budget apps.docx").exists());
    }

    #[tokio::test]
    async fn unwritable_output_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), keyword_sheet(dir.path()));
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, "not a directory").unwrap();
        job.output_dir = blocker;
        let provider = ScriptedProvider::new(vec![Ok(ARTICLE.into())]);

        let err = write_articles(&provider, &job, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, SeoScribeError::Io { .. }));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), dir.path().join("absent.csv"));
        let provider = ScriptedProvider::new(vec![]);
        assert!(write_articles(&provider, &job, &SilentProgress).await.is_err());
    }

    #[tokio::test]
    async fn outlines_are_cleaned_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("outlines").join("outlines.csv");
        let job = OutlineJob {
            input: keyword_sheet(dir.path()),
            output: output.clone(),
        };
        let provider = ScriptedProvider::new(vec![
            Ok("# Budget Apps\n\nI. Introduction\nII. Picking One".into()),
            Err(SeoScribeError::Generation("empty completion".into())),
            Ok("# Index Funds\n\nA. What They Are".into()),
        ]);

        let report = write_outlines(&provider, &job, &SilentProgress).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed[0].0, "2");
        assert_eq!(report.outputs, vec![output.clone()]);

        let rows = seoscribe_sheet::read_outlines(&output).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].serial, "1");
        assert_eq!(rows[0].outline, "# Budget Apps\n\nIntroduction\nPicking One");
        assert_eq!(rows[1].keyword, "index funds");

        for call in provider.calls() {
            assert_eq!(call.len(), 1);
            assert_eq!(call[0].role, Role::User);
        }
    }

    #[tokio::test]
    async fn outline_articles_read_the_outline_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = dir.path().join("outlines.csv");
        let mut writer = seoscribe_sheet::OutlineWriter::create(&sheet).unwrap();
        writer
            .append(&OutlineRow::new("7", "budget apps", "# Budget Apps\n\nWhy Budget"))
            .unwrap();
        drop(writer);

        let job = ArticleJob {
            output_dir: dir.path().join("outlines"),
            ..job(dir.path(), sheet)
        };
        let provider = ScriptedProvider::new(vec![Ok(ARTICLE.into())]);

        let report = write_outline_articles(&provider, &job, &SilentProgress).await.unwrap();

        assert_eq!(report.processed, 1);
        assert!(dir.path().join("outlines").join("7. budget apps.docx").exists());

        let calls = provider.calls();
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[0][1].content.starts_with("# Budget Apps\n\nWhy Budget\n\n"));
    }

    #[tokio::test]
    async fn empty_sheet_produces_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("keywords.csv");
        std::fs::write(&input, "SL,Keywords\n").unwrap();
        let provider = ScriptedProvider::new(vec![]);

        let report = write_articles(&provider, &job(dir.path(), input), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.outputs.is_empty());
    }

    #[test]
    fn jobs_follow_configured_paths() {
        let config = AppConfig::default();
        let articles = ArticleJob::articles(&config);
        let expand = ArticleJob::outline_articles(&config);
        let outlines = OutlineJob::from_config(&config);

        assert_eq!(articles.input, Path::new(&config.defaults.input_file));
        assert_eq!(articles.output_dir, Path::new(&config.defaults.documents_dir));
        assert_eq!(expand.input, config.defaults.outlines_path());
        assert_eq!(expand.output_dir, Path::new(&config.defaults.outlines_dir));
        assert_eq!(outlines.output, config.defaults.outlines_path());
    }

    #[test]
    fn markdown_file_renders_offline() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("draft.md");
        std::fs::write(&input, ARTICLE).unwrap();
        let output = dir.path().join("out").join("draft.docx");

        let doc = render_markdown_file(
            &input,
            &output,
            &NormalizeOptions::default(),
            &DocumentStyle::default(),
        )
        .unwrap();

        assert_eq!(doc.title(), Some("Budget Apps"));
        assert!(output.exists());
    }
}
