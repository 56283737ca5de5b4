//! Sorting session: root selection, enable/disable and the running watcher.
//!
//! A [`SortSession`] owns everything that changes at runtime. All lifecycle
//! calls go through one mutex, so two watches can never overlap and a switch
//! to another root always stops the old watch before the new one starts.

use crate::bulk_sort::{BulkReport, BulkSortError, BulkSorter};
use crate::file_organizer::FileOrganizer;
use crate::logging::RootLog;
use crate::watcher::{EventWatcher, WatchError};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Root directory {} does not exist", .0.display())]
    RootNotFound(PathBuf),
    #[error("Root {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("Root directory {} is read-only", .0.display())]
    RootReadOnly(PathBuf),
    #[error("Cannot access root directory {}: {source}", path.display())]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No root directory selected")]
    NoRoot,
    #[error(transparent)]
    BulkSort(#[from] BulkSortError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl SessionError {
    /// True for errors caused by the chosen root rather than the watch itself.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SessionError::RootNotFound(_)
                | SessionError::RootNotDirectory(_)
                | SessionError::RootReadOnly(_)
                | SessionError::RootInaccessible { .. }
                | SessionError::NoRoot
        )
    }
}

/// Snapshot returned by [`SortSession::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub root: Option<PathBuf>,
    pub enabled: bool,
    pub pending_moves: usize,
}

struct SessionState {
    root: Option<PathBuf>,
    enabled: bool,
    watcher: EventWatcher,
}

/// Owns the watch target and the enabled flag.
pub struct SortSession {
    organizer: Arc<FileOrganizer>,
    root_log: Option<RootLog>,
    state: Mutex<SessionState>,
}

impl SortSession {
    pub fn new(organizer: Arc<FileOrganizer>, settle_delay: Duration) -> Self {
        let watcher = EventWatcher::new(Arc::clone(&organizer), settle_delay);
        Self {
            organizer,
            root_log: None,
            state: Mutex::new(SessionState {
                root: None,
                enabled: false,
                watcher,
            }),
        }
    }

    /// Moves `log` under each root this session enables.
    pub fn with_root_log(mut self, log: RootLog) -> Self {
        self.root_log = Some(log);
        self
    }

    /// Sorts the existing files of `root`, then watches it.
    ///
    /// Enabling the root that is already being watched does nothing. Enabling
    /// another root stops the current watch first, and resumes it if the new
    /// root cannot be started.
    ///
    /// # Errors
    ///
    /// Fails synchronously if `root` is missing, not a directory or read-only,
    /// if it cannot be listed, or if the watch cannot be started.
    pub fn enable(&self, root: impl AsRef<Path>) -> Result<BulkReport, SessionError> {
        let root = validate_root(root.as_ref())?;
        let mut state = self.state.lock();

        if state.enabled && state.root.as_deref() == Some(root.as_path()) {
            debug!("Already sorting {}", root.display());
            return Ok(BulkReport::default());
        }

        self.retarget(&mut state, root)
    }

    /// Stops watching. Files already moved stay where they are.
    pub fn disable(&self) {
        let mut state = self.state.lock();
        if state.enabled {
            Self::stop_watch(&mut state);
            info!("Automatic sorting disabled");
        }
    }

    /// Stops sorting the current root and starts on `new_root`.
    ///
    /// `new_root` is validated before anything is stopped. If the new watch
    /// cannot be started, the previous root is watched again when possible.
    pub fn switch_root(&self, new_root: impl AsRef<Path>) -> Result<BulkReport, SessionError> {
        let new_root = validate_root(new_root.as_ref())?;
        let mut state = self.state.lock();
        self.retarget(&mut state, new_root)
    }

    /// Flips sorting on or off for the remembered root. Returns the new state.
    pub fn toggle(&self) -> Result<bool, SessionError> {
        let mut state = self.state.lock();
        if state.enabled {
            Self::stop_watch(&mut state);
            info!("Automatic sorting disabled");
            return Ok(false);
        }

        let root = state.root.clone().ok_or(SessionError::NoRoot)?;
        let root = validate_root(&root)?;
        self.start_on(&mut state, root)?;
        Ok(true)
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.lock();
        SessionStatus {
            root: state.root.clone(),
            enabled: state.enabled,
            pending_moves: state.watcher.pending_count(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.state.lock().root.clone()
    }

    fn stop_watch(state: &mut SessionState) {
        state.watcher.stop();
        state.enabled = false;
    }

    /// Moves the watch to `root`, going back to the previous root on failure.
    fn retarget(&self, state: &mut SessionState, root: PathBuf) -> Result<BulkReport, SessionError> {
        let previous = state.enabled.then(|| state.root.clone()).flatten();
        Self::stop_watch(state);

        match self.start_on(state, root) {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Some(previous) = previous {
                    warn!("Could not switch roots ({}); returning to {}", err, previous.display());
                    if let Err(restore) = self.start_on(state, previous) {
                        error!("Could not resume previous root: {}", restore);
                    }
                }
                Err(err)
            }
        }
    }

    /// Bulk sort then watch. Leaves `state` untouched and the log closed on error.
    fn start_on(&self, state: &mut SessionState, root: PathBuf) -> Result<BulkReport, SessionError> {
        if let Some(log) = &self.root_log {
            match log.open_in(&root) {
                Ok(path) => debug!("Logging to {}", path.display()),
                Err(e) => {
                    warn!("Cannot open log file under {}: {}", root.display(), e);
                    log.close();
                }
            }
        }

        let started = BulkSorter::new(Arc::clone(&self.organizer))
            .sort_existing(&root)
            .map_err(SessionError::from)
            .and_then(|report| {
                state.watcher.start(&root)?;
                Ok(report)
            });

        match started {
            Ok(report) => {
                state.root = Some(root);
                state.enabled = true;
                info!("Automatic sorting enabled");
                Ok(report)
            }
            Err(err) => {
                if let Some(log) = &self.root_log {
                    log.close();
                }
                Err(err)
            }
        }
    }
}

/// Checks that `root` is an existing, writable directory and canonicalizes it.
pub fn validate_root(root: &Path) -> Result<PathBuf, SessionError> {
    let canonical = fs::canonicalize(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SessionError::RootNotFound(root.to_path_buf()),
        _ => SessionError::RootInaccessible {
            path: root.to_path_buf(),
            source: e,
        },
    })?;

    let metadata = fs::metadata(&canonical).map_err(|e| SessionError::RootInaccessible {
        path: canonical.clone(),
        source: e,
    })?;
    if !metadata.is_dir() {
        return Err(SessionError::RootNotDirectory(canonical));
    }
    if metadata.permissions().readonly() {
        return Err(SessionError::RootReadOnly(canonical));
    }
    Ok(canonical)
}
