//! Notification collaborator.
//!
//! The sorter reports what it does through a [`Notifier`]. How the message
//! reaches the user (terminal, desktop toast, tray balloon) is up to the
//! implementation; the core only produces [`SortEvent`]s.

use crate::file_organizer::MoveRecord;
use std::fmt;
use std::path::{Path, PathBuf};

/// Something the sorter did that a user may want to hear about.
#[derive(Debug, Clone)]
pub enum SortEvent {
    /// A watch was started on `root`.
    WatchStarted { root: PathBuf },
    /// The watch on `root` was stopped.
    WatchStopped { root: PathBuf },
    /// A new file appeared and will be moved once it settles.
    FileDetected { path: PathBuf },
    /// A file was moved into its category.
    Moved(MoveRecord),
    /// A move was abandoned.
    MoveFailed { path: PathBuf, reason: String },
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for SortEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortEvent::WatchStarted { root } => write!(f, "Monitoring: {}", root.display()),
            SortEvent::WatchStopped { root } => {
                write!(f, "Stopped monitoring: {}", root.display())
            }
            SortEvent::FileDetected { path } => {
                write!(f, "New file detected: {}", file_name(path))
            }
            SortEvent::Moved(record) => {
                write!(
                    f,
                    "File '{}' moved to '{}'",
                    file_name(&record.original_path),
                    record.category
                )?;
                if record.renamed {
                    write!(f, " as '{}'", file_name(&record.new_path))?;
                }
                Ok(())
            }
            SortEvent::MoveFailed { path, reason } => {
                write!(f, "Error moving file '{}': {}", path.display(), reason)
            }
        }
    }
}

/// Receives sorter events. Called from background threads.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &SortEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &SortEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(renamed: bool) -> MoveRecord {
        MoveRecord {
            original_path: PathBuf::from("/root/photo.png"),
            new_path: PathBuf::from(if renamed {
                "/root/Images/photo (1).png"
            } else {
                "/root/Images/photo.png"
            }),
            category: "Images".to_string(),
            renamed,
        }
    }

    #[test]
    fn test_moved_message() {
        let event = SortEvent::Moved(record(false));
        assert_eq!(event.to_string(), "File 'photo.png' moved to 'Images'");
    }

    #[test]
    fn test_moved_with_rename_message() {
        let event = SortEvent::Moved(record(true));
        assert_eq!(
            event.to_string(),
            "File 'photo.png' moved to 'Images' as 'photo (1).png'"
        );
    }

    #[test]
    fn test_failure_message() {
        let event = SortEvent::MoveFailed {
            path: PathBuf::from("/root/locked.pdf"),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            event.to_string(),
            "Error moving file '/root/locked.pdf': permission denied"
        );
    }

    #[test]
    fn test_detected_message_uses_file_name() {
        let event = SortEvent::FileDetected {
            path: PathBuf::from("/downloads/setup.exe"),
        };
        assert_eq!(event.to_string(), "New file detected: setup.exe");
    }
}
