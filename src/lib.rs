//! autosort - keeps a directory sorted into per-type subfolders
//!
//! This library classifies files by extension, sweeps the files already in a
//! root directory into category subfolders, and watches the root so that new
//! files are moved once they have settled. Category tables and file filters
//! are configured through TOML files.

pub mod bulk_sort;
pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod logging;
pub mod notifier;
pub mod output;
pub mod session;
pub mod watcher;

pub use bulk_sort::{BulkReport, BulkSorter};
pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use file_category::{CategoryMap, DEFAULT_CATEGORY};
pub use file_organizer::{FileOrganizer, MoveError, MoveOutcome, MoveRecord};
pub use notifier::{Notifier, NullNotifier, SortEvent};
pub use session::{SessionError, SessionStatus, SortSession};
pub use watcher::{DEFAULT_SETTLE_DELAY, EventWatcher, WatchError};
