//! Command-line interface for autosort.
//!
//! This module handles:
//! - Argument parsing and configuration overrides
//! - One-shot and dry-run sorting
//! - The interactive session prompt (toggle, switch root, status, quit)

use crate::bulk_sort::{BulkReport, BulkSortError, BulkSorter};
use crate::config::{AppConfig, ConfigError};
use crate::file_organizer::{FileOrganizer, MoveOutcome, PlannedMove};
use crate::logging::{self, RootLog};
use crate::notifier::{Notifier, NullNotifier};
use crate::output::{ConsoleNotifier, OutputFormatter};
use crate::session::{self, SortSession};
use anyhow::Context;
use clap::{ArgAction, Parser};
use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Keeps a directory sorted into per-type subfolders.
#[derive(Debug, Parser)]
#[command(name = "autosort", version, about)]
pub struct Cli {
    /// Directory to sort. Defaults to `sorter.root` from the config, then the
    /// current directory.
    pub root: Option<PathBuf>,

    /// Configuration file to use instead of the default lookup.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seconds a new file must sit before it is moved.
    #[arg(long, value_name = "SECS")]
    pub settle_secs: Option<u64>,

    /// Category for unmapped extensions.
    #[arg(long, value_name = "NAME")]
    pub default_category: Option<String>,

    /// Sort the existing files and exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub once: bool,

    /// Show where the existing files would go without moving anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not write the log file under the root.
    #[arg(long)]
    pub no_log_file: bool,

    /// Increase console log output (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// A command typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Toggle,
    SwitchRoot(PathBuf),
    Status,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match (word.to_lowercase().as_str(), rest) {
            ("toggle" | "t", "") => Ok(SessionCommand::Toggle),
            ("status" | "s", "") => Ok(SessionCommand::Status),
            ("help" | "h" | "?", "") => Ok(SessionCommand::Help),
            ("quit" | "q" | "exit", "") => Ok(SessionCommand::Quit),
            ("root" | "r", "") => Err("Usage: root <path>".to_string()),
            ("root" | "r", path) => Ok(SessionCommand::SwitchRoot(PathBuf::from(path))),
            _ => Err(format!("Unknown command '{}'. Type 'help' for commands.", line)),
        }
    }
}

const HELP: &str = "\
Commands:
  toggle        enable or disable automatic sorting
  root <path>   sort a different directory
  status        show the current root and state
  help          show this help
  quit          stop sorting and exit";

/// Runs autosort with parsed arguments.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Error loading configuration")?;
    if let Some(secs) = cli.settle_secs {
        config.sorter.settle_delay_secs = secs;
    }
    if let Some(category) = &cli.default_category {
        config.sorter.default_category = category.clone();
    }

    let root = resolve_root(cli.root.as_deref(), &config)?;
    let root = session::validate_root(&root)?;

    let root_log = (!cli.no_log_file && !cli.dry_run)
        .then(|| RootLog::new(&config.sorter.log_dir, &config.sorter.log_file));
    let _guard = logging::init(cli.verbose, root_log.clone())?;

    if cli.dry_run {
        let organizer = build_organizer(&config, Arc::new(NullNotifier))?;
        dry_run(Arc::new(organizer), &root)?;
        return Ok(());
    }

    if cli.once {
        if let Some(log) = &root_log {
            log.open_in(&root)
                .with_context(|| format!("Error opening log file under {}", root.display()))?;
        }
        let organizer = build_organizer(&config, Arc::new(NullNotifier))?;
        let report = sort_once(Arc::new(organizer), &root)?;
        if report.failed() > 0 {
            anyhow::bail!("{} files could not be sorted", report.failed());
        }
        return Ok(());
    }

    let organizer = build_organizer(&config, Arc::new(ConsoleNotifier))?;
    debug!("Categories: {}", organizer.categories().categories().join(", "));
    let mut session = SortSession::new(Arc::new(organizer), config.sorter.settle_delay());
    if let Some(log) = root_log {
        session = session.with_root_log(log);
    }

    let report = session.enable(&root)?;
    print_report(&report);
    OutputFormatter::plain(HELP);

    let stdin = io::stdin();
    interact(&session, stdin.lock()).context("Error reading commands")?;
    session.disable();
    Ok(())
}

/// Root from the command line, else from the config, else the current directory.
pub fn resolve_root(cli_root: Option<&Path>, config: &AppConfig) -> io::Result<PathBuf> {
    match cli_root.or(config.sorter.root.as_deref()) {
        Some(root) => Ok(root.to_path_buf()),
        None => env::current_dir(),
    }
}

/// Builds the mover from the category table and filters in `config`.
pub fn build_organizer(
    config: &AppConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<FileOrganizer, ConfigError> {
    let categories = config.category_map()?;
    let filters = config.compile_filters()?;
    Ok(FileOrganizer::new(categories, filters).with_notifier(notifier))
}

/// Sorts the files already in `root` with a progress bar, then prints a summary.
pub fn sort_once(organizer: Arc<FileOrganizer>, root: &Path) -> Result<BulkReport, BulkSortError> {
    OutputFormatter::info(&format!("Sorting contents of: {}", root.display()));

    let files = BulkSorter::top_level_files(root)?;
    if files.is_empty() {
        OutputFormatter::plain("No files found to sort.");
        return Ok(BulkReport::default());
    }

    let pb = OutputFormatter::create_progress_bar(files.len() as u64);
    let report = BulkSorter::new(organizer).sort_files(root, &files, |outcome| {
        if let MoveOutcome::Moved(record) = outcome {
            pb.set_message(record.category.clone());
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    print_report(&report);
    Ok(report)
}

/// Prints where each file in `root` would go. Moves nothing.
pub fn dry_run(
    organizer: Arc<FileOrganizer>,
    root: &Path,
) -> Result<Vec<PlannedMove>, BulkSortError> {
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", root.display()));

    let plan = BulkSorter::new(organizer).preview(root)?;
    if plan.is_empty() {
        OutputFormatter::plain("No files found to sort.");
        return Ok(plan);
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for planned in &plan {
        OutputFormatter::plain(&format!(" - {}", planned.file_name));
        OutputFormatter::plain(&format!("   → Would move to {}/", planned.category));
        *counts.entry(planned.category.clone()).or_insert(0) += 1;
    }

    OutputFormatter::summary_table(&counts);
    OutputFormatter::dry_run_notice("No files were modified.");
    Ok(plan)
}

fn print_report(report: &BulkReport) {
    if report.moved() > 0 {
        OutputFormatter::summary_table(&report.by_category);
    }
    for (path, reason) in &report.failures {
        OutputFormatter::error(&format!("Error moving file '{}': {}", path.display(), reason));
    }
}

/// Reads commands from `input` until `quit` or end of input.
///
/// Bad commands and failed operations are reported and the prompt continues.
pub fn interact<R: BufRead>(session: &SortSession, input: R) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<SessionCommand>() {
            Ok(SessionCommand::Quit) => break,
            Ok(command) => execute(session, command),
            Err(message) => OutputFormatter::warning(&message),
        }
    }
    Ok(())
}

fn execute(session: &SortSession, command: SessionCommand) {
    match command {
        SessionCommand::Toggle => match session.toggle() {
            Ok(true) => OutputFormatter::success("Automatic sorting enabled"),
            Ok(false) => OutputFormatter::warning("Automatic sorting disabled"),
            Err(e) => OutputFormatter::error(&e.to_string()),
        },
        SessionCommand::SwitchRoot(path) => match session.switch_root(&path) {
            Ok(report) => print_report(&report),
            Err(e) if e.is_config_error() => OutputFormatter::warning(&e.to_string()),
            Err(e) => OutputFormatter::error(&e.to_string()),
        },
        SessionCommand::Status => OutputFormatter::status(&session.status()),
        SessionCommand::Help => OutputFormatter::plain(HELP),
        SessionCommand::Quit => {}
    }
}
