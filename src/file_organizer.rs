/// Moving single files into their category directories.
///
/// [`FileOrganizer`] is the one place that mutates the filesystem. It checks
/// that a path is still a regular file, classifies it by name, creates
/// `<root>/<category>/` when needed and moves the file there. A name conflict
/// at the destination is resolved by adding a numeric suffix, so existing
/// files are never overwritten.
use crate::config::CompiledFilters;
use crate::file_category::CategoryMap;
use crate::notifier::{Notifier, NullNotifier, SortEvent};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Upper bound on `name (n).ext` candidates tried for one file.
pub const MAX_CONFLICT_SUFFIX: u32 = 10_000;

/// Errors that abandon a single move. None of them stop the sorter.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Failed to create a category directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move a file to its category directory.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Every candidate name in the category directory was taken.
    #[error("No free name for '{file_name}' in {} after {attempts} attempts", directory.display())]
    ConflictUnresolved {
        file_name: String,
        directory: PathBuf,
        attempts: u32,
    },
    /// The path has no file name component (e.g. `..`).
    #[error("{} has no file name component", .0.display())]
    MissingFileName(PathBuf),
}

/// A completed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// The path of the file before the move.
    pub original_path: PathBuf,
    /// The path of the file after the move.
    pub new_path: PathBuf,
    /// The category directory the file was moved into.
    pub category: String,
    /// True if the file got a suffixed name because its own name was taken.
    pub renamed: bool,
}

/// Why a path was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The path is missing, a directory, or otherwise not a regular file.
    NotAFile,
    /// The file matched an exclude rule.
    Excluded,
}

/// Result of [`FileOrganizer::move_file`].
#[derive(Debug)]
pub enum MoveOutcome {
    Moved(MoveRecord),
    Skipped { path: PathBuf, reason: SkipReason },
    Failed { path: PathBuf, error: MoveError },
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved(_))
    }

    /// The move record, if the file was moved.
    pub fn record(&self) -> Option<&MoveRecord> {
        match self {
            MoveOutcome::Moved(record) => Some(record),
            _ => None,
        }
    }
}

/// A move that would happen, computed without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub file_name: String,
    pub category: String,
}

/// Moves files into category subdirectories of a root directory.
///
/// Shared between the bulk sorter and the watcher's mover thread; the category
/// map and filters are read-only after construction.
pub struct FileOrganizer {
    categories: CategoryMap,
    filters: CompiledFilters,
    notifier: Arc<dyn Notifier>,
}

impl FileOrganizer {
    /// Creates an organizer that reports to nobody.
    pub fn new(categories: CategoryMap, filters: CompiledFilters) -> Self {
        Self {
            categories,
            filters,
            notifier: Arc::new(NullNotifier),
        }
    }

    /// Replaces the notifier that receives move and failure events.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Moves `file_path` into `root/<category>/`.
    ///
    /// The path is checked when the call is made: a path that no longer names
    /// a regular file is skipped, since it may have been moved or deleted in
    /// the meantime. I/O errors are logged, reported to the notifier and
    /// returned as [`MoveOutcome::Failed`]; they never panic or propagate.
    ///
    /// # Arguments
    ///
    /// * `file_path` - The file to move, normally a direct child of `root`
    /// * `root` - The directory holding the category subdirectories
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use autosort::config::CompiledFilters;
    /// use autosort::file_category::CategoryMap;
    /// use autosort::file_organizer::{FileOrganizer, MoveOutcome};
    /// use std::path::Path;
    ///
    /// let organizer = FileOrganizer::new(CategoryMap::default(), CompiledFilters::default());
    /// match organizer.move_file(Path::new("/data/inbox/photo.png"), Path::new("/data/inbox")) {
    ///     MoveOutcome::Moved(record) => println!("now at {}", record.new_path.display()),
    ///     MoveOutcome::Skipped { reason, .. } => println!("skipped: {:?}", reason),
    ///     MoveOutcome::Failed { error, .. } => eprintln!("failed: {}", error),
    /// }
    /// ```
    pub fn move_file(&self, file_path: &Path, root: &Path) -> MoveOutcome {
        let file_name = match self.sortable_name(file_path) {
            Ok(name) => name,
            Err(reason) => {
                debug!("Skipping {}: {:?}", file_path.display(), reason);
                return MoveOutcome::Skipped {
                    path: file_path.to_path_buf(),
                    reason,
                };
            }
        };

        let category = self.categories.classify(&file_name).to_string();
        match Self::move_to_category(root, file_path, &category) {
            Ok(record) => {
                info!("File '{}' moved to '{}'", file_name, category);
                self.notifier.notify(&SortEvent::Moved(record.clone()));
                MoveOutcome::Moved(record)
            }
            Err(e) => {
                error!("Error moving file '{}': {}", file_path.display(), e);
                self.notifier.notify(&SortEvent::MoveFailed {
                    path: file_path.to_path_buf(),
                    reason: e.to_string(),
                });
                MoveOutcome::Failed {
                    path: file_path.to_path_buf(),
                    error: e,
                }
            }
        }
    }

    /// Computes what [`move_file`](Self::move_file) would do, without moving anything.
    pub fn plan(&self, file_path: &Path) -> Option<PlannedMove> {
        let file_name = self.sortable_name(file_path).ok()?;
        Some(PlannedMove {
            source: file_path.to_path_buf(),
            category: self.categories.classify(&file_name).to_string(),
            file_name,
        })
    }

    /// Returns the file name if `file_path` is a regular file that passes the filters.
    fn sortable_name(&self, file_path: &Path) -> Result<String, SkipReason> {
        let is_file = fs::metadata(file_path)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(SkipReason::NotAFile);
        }

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(SkipReason::NotAFile)?;

        if !self.filters.should_include(&file_name) {
            return Err(SkipReason::Excluded);
        }
        Ok(file_name)
    }

    /// Moves a file into `root/<category>` and records the operation.
    ///
    /// The category directory is created first if missing. If the file name is
    /// already taken there, the first free `stem (n).ext` is used instead.
    ///
    /// # Returns
    ///
    /// Returns `Ok(MoveRecord)` on success, or a [`MoveError`] describing which
    /// step failed.
    pub fn move_to_category(
        root: &Path,
        file_path: &Path,
        category: &str,
    ) -> Result<MoveRecord, MoveError> {
        let category_path = root.join(category);

        fs::create_dir_all(&category_path).map_err(|e| MoveError::DirectoryCreationFailed {
            path: category_path.clone(),
            source: e,
        })?;

        let file_name = file_path
            .file_name()
            .ok_or_else(|| MoveError::MissingFileName(file_path.to_path_buf()))?;

        let (destination_path, renamed) = free_destination(&category_path, file_name)?;

        relocate(file_path, &destination_path).map_err(|e| MoveError::FileMoveFailure {
            from: file_path.to_path_buf(),
            to: destination_path.clone(),
            source: e,
        })?;

        Ok(MoveRecord {
            original_path: file_path.to_path_buf(),
            new_path: destination_path,
            category: category.to_string(),
            renamed,
        })
    }
}

impl Default for FileOrganizer {
    fn default() -> Self {
        Self::new(CategoryMap::default(), CompiledFilters::default())
    }
}

/// Nothing, not even a dangling symlink, occupies `path`.
fn is_free(path: &Path) -> bool {
    fs::symlink_metadata(path).is_err()
}

/// Picks the destination path inside `directory`, suffixing on conflict.
fn free_destination(directory: &Path, file_name: &OsStr) -> Result<(PathBuf, bool), MoveError> {
    let candidate = directory.join(file_name);
    if is_free(&candidate) {
        return Ok((candidate, false));
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 1..=MAX_CONFLICT_SUFFIX {
        let suffixed = match &extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = directory.join(suffixed);
        if is_free(&candidate) {
            return Ok((candidate, true));
        }
    }

    Err(MoveError::ConflictUnresolved {
        file_name: file_name.to_string_lossy().into_owned(),
        directory: directory.to_path_buf(),
        attempts: MAX_CONFLICT_SUFFIX,
    })
}

/// Renames `from` to `to`, copying across filesystems when a rename cannot.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                // leave the source in place rather than keep two copies
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Notifier for Recorder {
        fn notify(&self, event: &SortEvent) {
            self.0.lock().unwrap().push(event.to_string());
        }
    }

    fn organizer() -> FileOrganizer {
        FileOrganizer::default()
    }

    fn organizer_excluding(extensions: &[&str]) -> FileOrganizer {
        let rules = crate::config::FilterRules {
            exclude: crate::config::ExcludeRules {
                extensions: extensions.iter().map(|e| e.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        FileOrganizer::new(CategoryMap::default(), rules.compile().unwrap())
    }

    #[test]
    fn test_move_image_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let file_path = root.join("test_image.png");
        fs::write(&file_path, "test").unwrap();

        let outcome = organizer().move_file(&file_path, root);

        let record = outcome.record().expect("file should be moved");
        assert_eq!(record.category, "Images");
        assert_eq!(record.new_path, root.join("Images").join("test_image.png"));
        assert!(!record.renamed);
        assert!(!file_path.exists());
        assert!(root.join("Images/test_image.png").exists());
    }

    #[test]
    fn test_move_unknown_file_type_to_default_category() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file_path = root.join("test_unknown.xyz");
        fs::write(&file_path, "test").unwrap();

        assert!(organizer().move_file(&file_path, root).is_moved());
        assert!(root.join("Misc/test_unknown.xyz").exists());
    }

    #[test]
    fn test_move_uses_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Docs")).unwrap();
        fs::write(root.join("Docs/keep.txt"), "old").unwrap();
        let file_path = root.join("report.pdf");
        fs::write(&file_path, "test").unwrap();

        assert!(organizer().move_file(&file_path, root).is_moved());
        assert!(root.join("Docs/report.pdf").exists());
        assert!(root.join("Docs/keep.txt").exists());
    }

    #[test]
    fn test_conflict_gets_numeric_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Images")).unwrap();
        fs::write(root.join("Images/photo.png"), "first").unwrap();
        fs::write(root.join("Images/photo (1).png"), "second").unwrap();
        let file_path = root.join("photo.png");
        fs::write(&file_path, "third").unwrap();

        let outcome = organizer().move_file(&file_path, root);
        let record = outcome.record().unwrap();

        assert!(record.renamed);
        assert_eq!(record.new_path, root.join("Images/photo (2).png"));
        assert_eq!(fs::read_to_string(root.join("Images/photo.png")).unwrap(), "first");
        assert_eq!(fs::read_to_string(root.join("Images/photo (2).png")).unwrap(), "third");
    }

    #[test]
    fn test_conflict_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Misc")).unwrap();
        fs::write(root.join("Misc/LICENSE"), "old").unwrap();
        let file_path = root.join("LICENSE");
        fs::write(&file_path, "new").unwrap();

        let record = organizer()
            .move_file(&file_path, root)
            .record()
            .cloned()
            .unwrap();
        assert_eq!(record.new_path, root.join("Misc/LICENSE (1)"));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let outcome = organizer().move_file(&root.join("gone.png"), root);
        assert!(matches!(
            outcome,
            MoveOutcome::Skipped {
                reason: SkipReason::NotAFile,
                ..
            }
        ));
        assert!(!root.join("Images").exists());
    }

    #[test]
    fn test_directory_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("album.png")).unwrap();

        let outcome = organizer().move_file(&root.join("album.png"), root);
        assert!(matches!(outcome, MoveOutcome::Skipped { .. }));
        assert!(root.join("album.png").is_dir());
    }

    #[test]
    fn test_excluded_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file_path = root.join("movie.mkv.part");
        fs::write(&file_path, "partial").unwrap();

        let outcome = organizer_excluding(&["part"]).move_file(&file_path, root);
        assert!(matches!(
            outcome,
            MoveOutcome::Skipped {
                reason: SkipReason::Excluded,
                ..
            }
        ));
        assert!(file_path.exists());
    }

    #[test]
    fn test_default_organizer_moves_hidden_and_temporary_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in [".hidden.png", "notes.tmp", "song.download"] {
            fs::write(root.join(name), "x").unwrap();
        }

        assert!(organizer().move_file(&root.join(".hidden.png"), root).is_moved());
        assert!(organizer().move_file(&root.join("notes.tmp"), root).is_moved());
        assert!(organizer().move_file(&root.join("song.download"), root).is_moved());

        assert!(root.join("Images/.hidden.png").is_file());
        assert!(root.join("Misc/notes.tmp").is_file());
        assert!(root.join("Misc/song.download").is_file());
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        // a regular file where the category directory should go
        fs::write(root.join("Images"), "blocker").unwrap();
        let file_path = root.join("photo.png");
        fs::write(&file_path, "data").unwrap();

        let recorder = Arc::new(Recorder::default());
        let organizer = organizer().with_notifier(recorder.clone());
        let outcome = organizer.move_file(&file_path, root);

        assert!(matches!(
            outcome,
            MoveOutcome::Failed {
                error: MoveError::DirectoryCreationFailed { .. },
                ..
            }
        ));
        assert!(file_path.exists());
        let messages = recorder.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Error moving file"));
    }

    #[test]
    fn test_move_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file_path = root.join("song.mp3");
        fs::write(&file_path, "data").unwrap();

        let recorder = Arc::new(Recorder::default());
        let organizer = organizer().with_notifier(recorder.clone());
        organizer.move_file(&file_path, root);

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["File 'song.mp3' moved to 'Music'".to_string()]
        );
    }

    #[test]
    fn test_plan_does_not_touch_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file_path = root.join("clip.mp4");
        fs::write(&file_path, "data").unwrap();

        let plan = organizer().plan(&file_path).unwrap();
        assert_eq!(plan.category, "Videos");
        assert_eq!(plan.file_name, "clip.mp4");
        assert!(file_path.exists());
        assert!(!root.join("Videos").exists());
        assert!(organizer().plan(&root.join("missing.mp4")).is_none());
    }
}
