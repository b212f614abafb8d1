//! SEOScribe CLI: keyword sheet in, styled article documents out.
//!
//! Each run reads a keyword (or outline) sheet, asks the chat model for
//! content row by row, cleans the Markdown it returns and saves a `.docx`
//! per row.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
