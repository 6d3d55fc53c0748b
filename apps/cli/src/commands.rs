//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docshelf_core::{BuildOptions, SyncOptions, run_build, run_sync};
use docshelf_shared::{config_file_path, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docshelf — turn document trees into a static reader site.
#[derive(Parser)]
#[command(
    name = "docshelf",
    version,
    about = "Convert txt/md/docx documents into HTML fragments and an index for the reader front end.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Scan the local source tree, convert documents, and write the index.
    Sync {
        /// Project root containing the source tree and reader/ directory.
        #[arg(long, env = "DOCSHELF_ROOT")]
        root: Option<PathBuf>,

        /// Parallel conversion workers.
        #[arg(long, default_value_t = 8)]
        workers: usize,
    },

    /// Fetch documents from the configured GitHub repository and build the
    /// reader output.
    Build {
        /// Project root containing reader/config.json and the cache.
        #[arg(long, env = "DOCSHELF_ROOT")]
        root: Option<PathBuf>,

        /// Output reader directory (defaults to <root>/reader).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Parallel conversion workers.
        #[arg(long, default_value_t = 8)]
        workers: usize,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default reader/config.json.
    Init {
        /// Project root to initialize.
        #[arg(long, env = "DOCSHELF_ROOT")]
        root: Option<PathBuf>,
    },
    /// Show the resolved configuration.
    Show {
        /// Project root to read from.
        #[arg(long, env = "DOCSHELF_ROOT")]
        root: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docshelf=info",
        1 => "docshelf=debug",
        _ => "docshelf=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sync { root, workers } => cmd_sync(root, workers).await,
        Command::Build { root, out, workers } => cmd_build(root, out, workers).await,
        Command::Config { action } => match action {
            ConfigAction::Init { root } => cmd_config_init(root),
            ConfigAction::Show { root } => cmd_config_show(root),
        },
    }
}

/// Resolve the project root: flag/env value or the working directory.
fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sync(root: Option<PathBuf>, workers: usize) -> Result<()> {
    let root = resolve_root(root)?;
    let config = load_config(&root)?;

    let opts = SyncOptions {
        root: root.clone(),
        workers,
    };

    let report = run_sync(&config, &opts, None).await?;

    println!(
        "sync complete: {} converted, {} skipped, {} pruned, {} failed ({:.1}s)",
        report.converted,
        report.skipped,
        report.pruned,
        report.failed.len(),
        report.elapsed.as_secs_f64()
    );
    print_failures(&report.failed);

    Ok(())
}

async fn cmd_build(root: Option<PathBuf>, out: Option<PathBuf>, workers: usize) -> Result<()> {
    let root = resolve_root(root)?;
    let config = load_config(&root)?;

    if config.github_repo.is_empty() {
        return Err(eyre!(
            "github_repo is not set in {}",
            config_file_path(&root).display()
        ));
    }

    info!(repo = %config.github_repo, branch = %config.target_branch, "building from remote");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid progress template"),
    );
    spinner.set_message(format!("fetching {}", config.github_repo));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut opts = BuildOptions::new(root);
    opts.out_dir = out;
    opts.workers = workers;

    let result = run_build(&config, &opts, None).await;
    spinner.finish_and_clear();

    let report = result?;
    println!(
        "build complete: {} listed, {} downloaded, {} cached, {} converted, {} skipped, {} failed ({:.1}s)",
        report.listed,
        report.downloaded,
        report.cached,
        report.converted,
        report.skipped,
        report.failed.len(),
        report.elapsed.as_secs_f64()
    );
    print_failures(&report.failed);

    Ok(())
}

fn cmd_config_init(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let path = init_config(&root)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_config_show(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let config = load_config(&root)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Print the per-file failure list, if any.
fn print_failures(failed: &[(String, String)]) {
    if failed.is_empty() {
        return;
    }

    eprintln!("failed files ({}):", failed.len());
    for (path, error) in failed {
        eprintln!("  - {path}: {error}");
    }
}
