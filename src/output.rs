//! Output formatting and styling module.
//!
//! Provides a centralized interface for all terminal output: colored status
//! lines, the bulk sort progress bar and the per-category summary table.
//! [`ConsoleNotifier`] routes sorter events through the same styling.

use crate::notifier::{Notifier, SortEvent};
use crate::session::SessionStatus;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

const PROGRESS_TEMPLATE: &str = "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for bulk sorting
/// - Summary tables with per-category counts
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use autosort::output::OutputFormatter;
    /// OutputFormatter::success("File 'report.pdf' moved to 'Docs'");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use autosort::output::OutputFormatter;
    /// OutputFormatter::error("Error moving file 'locked.pdf': permission denied");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use autosort::output::OutputFormatter;
    /// OutputFormatter::info("Monitoring: /home/user/Downloads");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for a bulk sort of `total` files.
    ///
    /// Falls back to the default bar style if the template is rejected.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use autosort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Sorted");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints a summary table with the number of files per category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use autosort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Docs".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>) {
        Self::header("SUMMARY");
        for line in Self::summary_lines(category_counts) {
            println!("{}", line);
        }
    }

    /// Rows of the summary table, uncolored.
    pub fn summary_lines(category_counts: &BTreeMap<String, usize>) -> Vec<String> {
        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max("Category".len());
        let total: usize = category_counts.values().sum();
        let rule = "-".repeat(width + 10);

        let mut lines = vec![format!("{:<width$} | Files", "Category"), rule.clone()];
        for (category, count) in category_counts {
            lines.push(format!("{:<width$} | {} {}", category, count, plural(*count)));
        }
        lines.push(rule);
        lines.push(format!("{:<width$} | {} {}", "Total", total, plural(total)));
        lines
    }

    /// Prints a session status snapshot.
    pub fn status(status: &SessionStatus) {
        let root = status
            .root
            .as_ref()
            .map(|r| r.display().to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let state = if status.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!("Root:          {}", root);
        println!("Auto-sorting:  {}", state);
        println!("Pending moves: {}", status.pending_moves);
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Prints sorter events to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, event: &SortEvent) {
        let message = event.to_string();
        match event {
            SortEvent::Moved(_) => OutputFormatter::success(&message),
            SortEvent::MoveFailed { .. } => OutputFormatter::error(&message),
            SortEvent::WatchStopped { .. } => OutputFormatter::warning(&message),
            SortEvent::WatchStarted { .. } | SortEvent::FileDetected { .. } => {
                OutputFormatter::info(&message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let mut counts = BTreeMap::new();
        counts.insert("Images".to_string(), 2);
        counts.insert("Docs".to_string(), 1);

        let lines = OutputFormatter::summary_lines(&counts);
        assert_eq!(lines[0], "Category | Files");
        assert_eq!(lines[2], "Docs     | 1 file");
        assert_eq!(lines[3], "Images   | 2 files");
        assert_eq!(lines[5], "Total    | 3 files");
    }

    #[test]
    fn test_summary_lines_widen_for_long_names() {
        let mut counts = BTreeMap::new();
        counts.insert("DiskImages".to_string(), 1);

        let lines = OutputFormatter::summary_lines(&counts);
        assert_eq!(lines[0], "Category   | Files");
        assert_eq!(lines[1].len(), 20);
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = OutputFormatter::create_progress_bar(7);
        assert_eq!(pb.length(), Some(7));
    }
}
