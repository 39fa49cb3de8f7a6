//! Collects download statistics for CurseForge mods and attributes them to the modpacks that bundle them.
//!
//! # Overview
//!
//! `modstats` records, for each tracked project, its metadata, authors, files, and download
//! counts at the time of collection. It also discovers which modpacks declare the project as a
//! dependency, by downloading each modpack archive and reading its `manifest.json`. Collected
//! snapshots land in a SQLite statistics database so download growth can later be split into
//! downloads made directly and downloads made through modpacks.
//!
//! # Quick Start
//!
//! ```bash
//! export CURSEFORGE_API_KEY=...
//! modstats collect --project 238222
//! modstats report --project 238222
//! ```
//!
//! # Commands
//!
//! - `collect --project ID [--project ID ...] [--force] [--dry-run]` takes a snapshot of each project.
//!   Projects whose stored data is already current are skipped unless `--force` is given.
//! - `retry --reason REASON [--max-file-length BYTES] [--timestamp UNIX]` re-attempts files that
//!   earlier runs gave up on, usually with a larger size ceiling.
//! - `skipped [--reason REASON]` lists the skipped-file ledger.
//! - `report --project ID` prints the dependents and the download composition history.
//! - `init [PATH]` writes a commented default configuration file.
//! - `validate [--config PATH]` checks a configuration file.
//!
//! Skip reasons are `ZERO_DOWNLOADS`, `DOWNLOAD_TOO_LARGE`, `DOWNLOAD_ERROR`, and `FILE_PARSING_ERROR`.
//!
//! # Configuration
//!
//! Settings are read from `modstats.toml`, `modstats.yml`, `modstats.yaml`, or `modstats.json` in
//! the current directory, or from the file given with `--config`. Relative database paths are
//! resolved against the data directory, which defaults to the platform's application data location
//! and can be overridden with `--data-dir`. Only one process may use a data directory at a time.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use modstats::Result;

mod commands;

use crate::commands::{
    CollectArgs, InitArgs, ReportArgs, RetryArgs, SkippedArgs, ValidateArgs, collect, init_config, list_skipped, report, retry,
    validate_config,
};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "modstats", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect statistics and dependents for one or more projects
    Collect(Box<CollectArgs>),
    /// Retry files previously skipped during dependency resolution
    Retry(Box<RetryArgs>),
    /// List files skipped during dependency resolution
    Skipped(Box<SkippedArgs>),
    /// Show dependents and download composition for a project
    Report(Box<ReportArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    match &Cli::parse().command {
        Command::Collect(args) => collect(args).await,
        Command::Retry(args) => retry(args).await,
        Command::Skipped(args) => list_skipped(args).await,
        Command::Report(args) => report(args).await,
        Command::Init(args) => init_config(args),
        Command::Validate(args) => validate_config(args),
    }
}
