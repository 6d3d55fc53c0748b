//! docshelf CLI — static document-reader build tool.
//!
//! Converts trees of txt/md/docx documents (local or fetched from a GitHub
//! repository) into HTML fragments plus the JSON index consumed by the
//! reader front end.

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
