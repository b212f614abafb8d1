//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use seoscribe_core::{ArticleJob, BatchReport, OutlineJob, ProgressReporter};
use seoscribe_llm::{ChatClient, ChatClientConfig};
use seoscribe_markdown::NormalizeOptions;
use seoscribe_shared::{
    AppConfig, config_file_path, init_config, init_config_at, load_config, load_config_from,
    resolve_api_key,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SEOScribe: keyword sheets in, SEO article documents out.
#[derive(Parser)]
#[command(
    name = "seoscribe",
    version,
    about = "Generate SEO articles from a keyword sheet and save them as styled Word documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.seoscribe/seoscribe.toml.
    #[arg(long, global = true, env = "SEOSCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Write one article document per keyword.
    Articles(RunArgs),

    /// Write an outline per keyword into the outline sheet.
    Outlines(OutlineArgs),

    /// Expand the outline sheet into article documents.
    Expand(RunArgs),

    /// Pick a run from an interactive menu.
    Menu,

    /// Convert a Markdown file into a styled document without calling the API.
    Format {
        /// Markdown file to convert.
        input: PathBuf,

        /// Output path (defaults to the input with a .docx extension).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for the runs that write documents.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct RunArgs {
    /// Input sheet (keywords for `articles`, outlines for `expand`).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Chat model to request.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not keep the raw model reply next to each document.
    #[arg(long)]
    pub no_debug_md: bool,
}

/// Overrides for the outline run, which writes a sheet rather than documents.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct OutlineArgs {
    /// Keyword sheet to read.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Outline sheet to write.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Chat model to request.
    #[arg(short, long)]
    pub model: Option<String>,
}

impl From<OutlineArgs> for RunArgs {
    fn from(args: OutlineArgs) -> Self {
        Self {
            input: args.input,
            out: args.out,
            model: args.model,
            no_debug_md: false,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// The three generation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RunKind {
    Articles,
    Outlines,
    Expand,
}

impl RunKind {
    fn label(self) -> &'static str {
        match self {
            Self::Articles => "articles",
            Self::Outlines => "outlines",
            Self::Expand => "outline articles",
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "seoscribe=info",
        1 => "seoscribe=debug",
        _ => "seoscribe=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Articles(args) => cmd_run(RunKind::Articles, &args, config_path).await,
        Command::Outlines(args) => cmd_run(RunKind::Outlines, &args.into(), config_path).await,
        Command::Expand(args) => cmd_run(RunKind::Expand, &args, config_path).await,
        Command::Menu => cmd_menu(config_path).await,
        Command::Format { input, out } => cmd_format(&input, out.as_deref(), config_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Generation runs
// ---------------------------------------------------------------------------

async fn cmd_run(kind: RunKind, args: &RunArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(model) = &args.model {
        config.openai.model = model.clone();
    }

    // Fail on a missing key before any sheet is touched.
    let api_key = resolve_api_key(&config)?;
    let client = ChatClient::new(ChatClientConfig::from_app_config(&config, api_key)?)?;

    info!(run = kind.label(), model = %config.openai.model, "starting run");

    let reporter = CliProgress::new();
    let report = match kind {
        RunKind::Articles | RunKind::Expand => {
            let mut job = if kind == RunKind::Articles {
                ArticleJob::articles(&config)
            } else {
                ArticleJob::outline_articles(&config)
            };
            if let Some(input) = &args.input {
                job.input = input.clone();
            }
            if let Some(out) = &args.out {
                job.output_dir = out.clone();
            }
            if args.no_debug_md {
                job.debug_markdown = false;
            }

            if kind == RunKind::Articles {
                seoscribe_core::write_articles(&client, &job, &reporter).await?
            } else {
                seoscribe_core::write_outline_articles(&client, &job, &reporter).await?
            }
        }
        RunKind::Outlines => {
            let mut job = OutlineJob::from_config(&config);
            if let Some(input) = &args.input {
                job.input = input.clone();
            }
            if let Some(out) = &args.out {
                job.output = out.clone();
            }
            seoscribe_core::write_outlines(&client, &job, &reporter).await?
        }
    };

    print_summary(kind, &report);
    println!("process finished");
    Ok(())
}

fn print_summary(kind: RunKind, report: &BatchReport) {
    println!();
    println!("  Run complete: {}", kind.label());
    println!("  Processed: {}", report.processed);
    println!("  Failed:    {}", report.failed.len());
    println!(
        "  Tokens:    {} in / {} out",
        report.tokens_in, report.tokens_out
    );
    if let Some(last) = report.outputs.last() {
        println!("  Output:    {}", last.display());
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    for (serial, error) in &report.failed {
        println!("  ✗ {serial}: {error}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// Interactive menu
// ---------------------------------------------------------------------------

const MENU_TEXT: &str = "Choose Version:\n\
[1] Press 1 for v1\n\
[2] Press 2 for v2\n\
[3] Press 3 for v3\n\
[4] Press q for quit\n";

/// A menu answer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MenuChoice {
    Run(RunKind),
    Quit,
    Invalid,
}

pub(crate) fn parse_menu_choice(input: &str) -> MenuChoice {
    match input.trim() {
        "1" => MenuChoice::Run(RunKind::Articles),
        "2" => MenuChoice::Run(RunKind::Outlines),
        "3" => MenuChoice::Run(RunKind::Expand),
        "q" | "Q" => MenuChoice::Quit,
        _ => MenuChoice::Invalid,
    }
}

async fn cmd_menu(config_path: Option<&Path>) -> Result<()> {
    let stdin = std::io::stdin();
    loop {
        print!("{MENU_TEXT}");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("Exiting the program");
            return Ok(());
        }

        match parse_menu_choice(&line) {
            MenuChoice::Run(kind) => {
                return cmd_run(kind, &RunArgs::default(), config_path).await;
            }
            MenuChoice::Quit => {
                println!("Exiting the program");
                return Ok(());
            }
            MenuChoice::Invalid => println!("Invalid choice: {}", line.trim()),
        }
    }
}

// ---------------------------------------------------------------------------
// Offline conversion
// ---------------------------------------------------------------------------

fn cmd_format(input: &Path, out: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    if !input.is_file() {
        return Err(eyre!("no Markdown file at '{}'", input.display()));
    }
    let config = resolve_config(config_path)?;
    let output = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("docx"));

    let document = seoscribe_core::render_markdown_file(
        input,
        &output,
        &NormalizeOptions::from(&config.markdown),
        &config.document,
    )?;

    println!();
    println!("  Document written!");
    println!("  Title:      {}", document.title().unwrap_or("(untitled)"));
    println!("  Paragraphs: {}", document.paragraph_count());
    println!("  Path:       {}", output.display());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_started(&self, current: usize, total: usize, label: &str) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {label}"));
    }

    fn row_finished(&self, current: usize, total: usize, ok: bool) {
        if !ok {
            self.spinner
                .println(format!("  ✗ row {current}/{total} failed, continuing"));
        }
    }

    fn done(&self, _report: &BatchReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", source.display());
    println!("{toml_str}");
    Ok(())
}
