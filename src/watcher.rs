//! Live sorting of files created in a root directory.
//!
//! An [`EventWatcher`] subscribes to filesystem events on the root
//! (non-recursively) and moves every new file into its category once it has
//! settled. Three threads cooperate while a watch is running:
//!
//! - the `notify` backend thread forwards raw events into a channel;
//! - the scheduler thread keeps one settle deadline per pending path and
//!   blocks on the channel until the nearest deadline;
//! - the mover thread performs the blocking filesystem work.
//!
//! A file that is still being written keeps producing modify events, and each
//! one pushes its deadline back. Stopping the watch drops the subscription,
//! discards every pending deadline and skips anything still queued.

use crate::file_organizer::FileOrganizer;
use crate::notifier::{Notifier, SortEvent};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// How long a new file must stay quiet before it is moved.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WatchError {
    /// `start` was called while a watch is running.
    #[error("Already watching {}", .0.display())]
    AlreadyRunning(PathBuf),
    /// The OS refused the subscription.
    #[error("Failed to watch {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("Failed to spawn watcher thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Message to the scheduler thread.
enum Signal {
    Fs(notify::Result<Event>),
    Shutdown,
}

/// Resources of a running watch.
struct ActiveWatch {
    root: PathBuf,
    // dropping this ends the OS subscription
    subscription: RecommendedWatcher,
    signals: Sender<Signal>,
    cancelled: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
    scheduler: JoinHandle<()>,
    mover: JoinHandle<()>,
}

/// Watches one root directory at a time. Stopped until [`start`](Self::start).
pub struct EventWatcher {
    organizer: Arc<FileOrganizer>,
    settle_delay: Duration,
    active: Option<ActiveWatch>,
}

impl EventWatcher {
    pub fn new(organizer: Arc<FileOrganizer>, settle_delay: Duration) -> Self {
        Self {
            organizer,
            settle_delay,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// The watched root, while running.
    pub fn root(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.root.as_path())
    }

    /// Number of files waiting for their settle delay.
    pub fn pending_count(&self) -> usize {
        self.active
            .as_ref()
            .map(|a| a.pending.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Starts watching `root` for new files.
    ///
    /// # Errors
    ///
    /// [`WatchError::AlreadyRunning`] if a watch is active (call [`stop`](Self::stop)
    /// first), [`WatchError::Subscribe`] if the OS refuses the watch. On error
    /// the watcher stays stopped.
    pub fn start(&mut self, root: &Path) -> Result<(), WatchError> {
        if let Some(active) = &self.active {
            return Err(WatchError::AlreadyRunning(active.root.clone()));
        }

        let (signal_tx, signal_rx) = mpsc::channel();
        let event_tx = signal_tx.clone();
        let mut subscription = notify::recommended_watcher(move |res| {
            // the receiver is gone once the watch has been stopped
            let _ = event_tx.send(Signal::Fs(res));
        })
        .map_err(|source| WatchError::Subscribe {
            path: root.to_path_buf(),
            source,
        })?;

        subscription
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Subscribe {
                path: root.to_path_buf(),
                source,
            })?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));
        let (move_tx, move_rx) = mpsc::channel::<PathBuf>();

        let mover = {
            let organizer = Arc::clone(&self.organizer);
            let cancelled = Arc::clone(&cancelled);
            let root = root.to_path_buf();
            thread::Builder::new()
                .name("autosort-mover".to_string())
                .spawn(move || {
                    for path in move_rx {
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        let sort = AssertUnwindSafe(|| organizer.move_file(&path, &root));
                        if panic::catch_unwind(sort).is_err() {
                            error!("Sorting {} panicked", path.display());
                        }
                    }
                })?
        };

        let scheduler = {
            let scheduler = SettleScheduler::new(
                self.settle_delay,
                Arc::clone(self.organizer.notifier()),
                Arc::clone(&pending),
            );
            thread::Builder::new()
                .name("autosort-scheduler".to_string())
                .spawn(move || scheduler.run(signal_rx, move_tx))?
        };

        info!("Monitoring: {}", root.display());
        self.organizer.notifier().notify(&SortEvent::WatchStarted {
            root: root.to_path_buf(),
        });

        self.active = Some(ActiveWatch {
            root: root.to_path_buf(),
            subscription,
            signals: signal_tx,
            cancelled,
            pending,
            scheduler,
            mover,
        });
        Ok(())
    }

    /// Stops the watch. Idempotent.
    ///
    /// Pending settle timers are cancelled and queued moves are skipped; a move
    /// already in progress finishes before this returns.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancelled.store(true, Ordering::Release);
        drop(active.subscription);
        let _ = active.signals.send(Signal::Shutdown);
        drop(active.signals);

        if active.scheduler.join().is_err() {
            error!("Scheduler thread for {} panicked", active.root.display());
        }
        if active.mover.join().is_err() {
            error!("Mover thread for {} panicked", active.root.display());
        }

        info!("Stopped monitoring: {}", active.root.display());
        self.organizer
            .notifier()
            .notify(&SortEvent::WatchStopped { root: active.root });
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Settle timers, one per path, owned by the scheduler thread.
struct SettleScheduler {
    settle_delay: Duration,
    deadlines: HashMap<PathBuf, Instant>,
    notifier: Arc<dyn Notifier>,
    pending: Arc<AtomicUsize>,
}

impl SettleScheduler {
    fn new(settle_delay: Duration, notifier: Arc<dyn Notifier>, pending: Arc<AtomicUsize>) -> Self {
        Self {
            settle_delay,
            deadlines: HashMap::new(),
            notifier,
            pending,
        }
    }

    fn run(mut self, signals: Receiver<Signal>, moves: Sender<PathBuf>) {
        loop {
            let signal = match self.next_deadline() {
                Some(deadline) => {
                    match signals.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                        Ok(signal) => Some(signal),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match signals.recv() {
                    Ok(signal) => Some(signal),
                    Err(_) => break,
                },
            };

            match signal {
                Some(Signal::Shutdown) => break,
                Some(Signal::Fs(Ok(event))) => self.handle_event(event),
                Some(Signal::Fs(Err(e))) => warn!("File watcher error: {}", e),
                None => {}
            }

            if self.dispatch_due(Instant::now(), &moves).is_err() {
                break;
            }
        }

        if !self.deadlines.is_empty() {
            debug!("Cancelled {} pending moves", self.deadlines.len());
        }
        self.deadlines.clear();
        self.sync_pending();
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    fn handle_event(&mut self, event: Event) {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => {}
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in event.paths {
                    self.schedule(path);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let Some(path) = event.paths.into_iter().last() {
                    self.schedule(path);
                }
            }
            // some backends cannot tell the two sides of a rename apart
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                for path in event.paths {
                    if path.exists() {
                        self.schedule(path);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
                for path in &event.paths {
                    self.rearm(path);
                }
            }
            _ => {}
        }
    }

    /// Starts, or restarts, the settle timer for a newly seen path.
    fn schedule(&mut self, path: PathBuf) {
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => return,
            Ok(_) => {}
            Err(_) => {
                debug!("Ignoring {}: gone before it could be scheduled", path.display());
                return;
            }
        }

        let deadline = Instant::now() + self.settle_delay;
        if self.deadlines.insert(path.clone(), deadline).is_none() {
            info!(
                "New file detected: {}",
                path.file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default()
            );
            let event = SortEvent::FileDetected { path };
            if panic::catch_unwind(AssertUnwindSafe(|| self.notifier.notify(&event))).is_err() {
                error!("Notifier panicked on: {}", event);
            }
        } else {
            debug!("Settle timer restarted for {}", path.display());
        }
        self.sync_pending();
    }

    /// Pushes back the deadline of a path that is still being written.
    fn rearm(&mut self, path: &Path) {
        if let Some(deadline) = self.deadlines.get_mut(path) {
            *deadline = Instant::now() + self.settle_delay;
        }
    }

    /// Hands every path whose deadline has passed to the mover.
    fn dispatch_due(
        &mut self,
        now: Instant,
        moves: &Sender<PathBuf>,
    ) -> Result<(), mpsc::SendError<PathBuf>> {
        let mut due = Vec::new();
        self.deadlines.retain(|path, deadline| {
            if *deadline <= now {
                due.push(path.clone());
                false
            } else {
                true
            }
        });
        self.sync_pending();

        for path in due {
            debug!("Settled: {}", path.display());
            moves.send(path)?;
        }
        Ok(())
    }

    fn sync_pending(&self) {
        self.pending.store(self.deadlines.len(), Ordering::Release);
    }
}
