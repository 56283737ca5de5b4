//! One-time sweep of the files already sitting in a root directory.
//!
//! Only the immediate children of the root are considered. Category
//! directories left by earlier runs are directories, so they are skipped and
//! never descended into; sorting the same root twice is a no-op the second time.

use crate::file_organizer::{FileOrganizer, MoveOutcome, PlannedMove};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BulkSortError {
    #[error("Error reading directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a bulk sort did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Files moved, per category.
    pub by_category: BTreeMap<String, usize>,
    /// Files left alone (excluded, or gone before they could be moved).
    pub skipped: usize,
    /// Files whose move failed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl BulkReport {
    /// Total number of files moved.
    pub fn moved(&self) -> usize {
        self.by_category.values().sum()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn record(&mut self, outcome: &MoveOutcome) {
        match outcome {
            MoveOutcome::Moved(record) => {
                *self.by_category.entry(record.category.clone()).or_insert(0) += 1;
            }
            MoveOutcome::Skipped { .. } => self.skipped += 1,
            MoveOutcome::Failed { path, error } => {
                self.failures.push((path.clone(), error.to_string()));
            }
        }
    }
}

/// Sorts the existing top-level files of a root directory.
pub struct BulkSorter {
    organizer: Arc<FileOrganizer>,
}

impl BulkSorter {
    pub fn new(organizer: Arc<FileOrganizer>) -> Self {
        Self { organizer }
    }

    /// Moves every regular file directly under `root` into its category.
    ///
    /// Per-file failures are recorded in the report; only an unreadable root
    /// is an error.
    pub fn sort_existing(&self, root: &Path) -> Result<BulkReport, BulkSortError> {
        let files = Self::top_level_files(root)?;
        Ok(self.sort_files(root, &files, |_| {}))
    }

    /// Moves the given files, calling `on_each` after every file.
    pub fn sort_files<F>(&self, root: &Path, files: &[PathBuf], mut on_each: F) -> BulkReport
    where
        F: FnMut(&MoveOutcome),
    {
        let mut report = BulkReport::default();
        for path in files {
            let outcome = self.organizer.move_file(path, root);
            report.record(&outcome);
            on_each(&outcome);
        }

        if report.moved() > 0 || report.failed() > 0 {
            info!(
                "Sorted existing files in {}: {} moved, {} failed",
                root.display(),
                report.moved(),
                report.failed()
            );
        }
        report
    }

    /// Lists what [`sort_existing`](Self::sort_existing) would move, without moving it.
    pub fn preview(&self, root: &Path) -> Result<Vec<PlannedMove>, BulkSortError> {
        Ok(Self::top_level_files(root)?
            .iter()
            .filter_map(|path| self.organizer.plan(path))
            .collect())
    }

    /// Regular files directly under `root`, sorted by name.
    ///
    /// The listing is taken before anything moves so the sweep never sees its
    /// own results.
    pub fn top_level_files(root: &Path) -> Result<Vec<PathBuf>, BulkSortError> {
        let entries = fs::read_dir(root).map_err(|e| BulkSortError::ReadDir {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tempfile::TempDir;

    fn sorter() -> BulkSorter {
        BulkSorter::new(Arc::new(FileOrganizer::default()))
    }

    #[test]
    fn test_sort_existing_moves_top_level_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["a.pdf", "b.png", "c.xyz"] {
            fs::write(root.join(name), name).unwrap();
        }

        let report = sorter().sort_existing(root).unwrap();

        assert_eq!(report.moved(), 3);
        assert_eq!(report.by_category.get("Docs"), Some(&1));
        assert!(root.join("Docs/a.pdf").exists());
        assert!(root.join("Images/b.png").exists());
        assert!(root.join("Misc/c.xyz").exists());
        assert!(!root.join("a.pdf").exists());
    }

    #[test]
    fn test_sort_existing_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("song.mp3"), "x").unwrap();
        fs::write(root.join("clip.mp4"), "x").unwrap();

        let first = sorter().sort_existing(root).unwrap();
        let second = sorter().sort_existing(root).unwrap();

        assert_eq!(first.moved(), 2);
        assert_eq!(second, BulkReport::default());
        assert!(root.join("Music/song.mp3").exists());
        assert!(root.join("Videos/clip.mp4").exists());
    }

    #[test]
    fn test_subdirectories_are_not_descended() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("projects")).unwrap();
        fs::write(root.join("projects/plan.pdf"), "x").unwrap();

        let report = sorter().sort_existing(root).unwrap();

        assert_eq!(report.moved(), 0);
        assert!(root.join("projects/plan.pdf").exists());
        assert!(!root.join("Docs").exists());
    }

    #[test]
    fn test_excluded_files_counted_as_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".hidden.png"), "x").unwrap();
        fs::write(root.join("big.iso.part"), "x").unwrap();

        let config = AppConfig::from_toml(
            r#"
            [filters]
            enable_hidden_files = false
            [filters.exclude]
            extensions = ["part"]
            "#,
        )
        .unwrap();
        let organizer = FileOrganizer::new(
            config.category_map().unwrap(),
            config.compile_filters().unwrap(),
        );

        let report = BulkSorter::new(Arc::new(organizer)).sort_existing(root).unwrap();
        assert_eq!(report.moved(), 0);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_default_filters_sort_hidden_and_partial_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["notes.tmp", ".hidden.png", "song.download"] {
            fs::write(root.join(name), "x").unwrap();
        }

        let report = sorter().sort_existing(root).unwrap();

        assert_eq!(report.moved(), 3);
        assert_eq!(report.skipped, 0);
        assert!(root.join("Misc/notes.tmp").exists());
        assert!(root.join("Images/.hidden.png").exists());
        assert!(root.join("Misc/song.download").exists());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = sorter().sort_existing(Path::new("/non/existent/root"));
        assert!(matches!(result, Err(BulkSortError::ReadDir { .. })));
    }

    #[test]
    fn test_preview_lists_planned_moves() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.zip"), "x").unwrap();
        fs::write(root.join("a.exe"), "x").unwrap();

        let plan = sorter().preview(root).unwrap();
        let summary: Vec<_> = plan
            .iter()
            .map(|p| (p.file_name.as_str(), p.category.as_str()))
            .collect();
        assert_eq!(summary, vec![("a.exe", "Programs"), ("b.zip", "Others")]);
        assert!(root.join("a.exe").exists());
    }

    #[test]
    fn test_sort_files_reports_progress() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("one.txt"), "x").unwrap();
        fs::write(root.join("two.txt"), "x").unwrap();

        let files = BulkSorter::top_level_files(root).unwrap();
        let mut seen = 0;
        let report = sorter().sort_files(root, &files, |_| seen += 1);

        assert_eq!(seen, 2);
        assert_eq!(report.by_category.get("Docs"), Some(&2));
    }
}
