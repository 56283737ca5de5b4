//! Tracing setup and the per-root log file.
//!
//! Log lines go to stderr and, when a [`RootLog`] is attached, to
//! `<root>/Logs/auto_sorter.log` in the form
//! `[DD/MM/YYYY HH:MM:SS] [LEVEL] message`. The file follows the session: when
//! the sorted root changes, the sink is reopened under the new root.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Logger already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Formats events as `[DD/MM/YYYY HH:MM:SS] [LEVEL] message`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BracketFormat;

impl BracketFormat {
    /// The line prefix for an event at `level` logged at `time`.
    pub fn prefix(time: &DateTime<Local>, level: &Level) -> String {
        format!("[{}] [{}] ", time.format(TIMESTAMP_FORMAT), level)
    }
}

impl<S, N> FormatEvent<S, N> for BracketFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{}",
            Self::prefix(&Local::now(), event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[derive(Debug)]
struct OpenLog {
    path: PathBuf,
    file: File,
}

/// Append-only log file that can be moved to another root at runtime.
///
/// Writes are dropped while no file is open.
#[derive(Debug, Clone)]
pub struct RootLog {
    dir_name: String,
    file_name: String,
    current: Arc<Mutex<Option<OpenLog>>>,
}

impl RootLog {
    /// A sink that will write to `<root>/<dir_name>/<file_name>` once opened.
    pub fn new(dir_name: &str, file_name: &str) -> Self {
        Self {
            dir_name: dir_name.to_string(),
            file_name: file_name.to_string(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Points the sink at `root`, creating the log directory if needed.
    pub fn open_in(&self, root: &Path) -> io::Result<PathBuf> {
        let dir = root.join(&self.dir_name);
        fs::create_dir_all(&dir)?;
        let path = dir.join(&self.file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        *self.current.lock() = Some(OpenLog {
            path: path.clone(),
            file,
        });
        Ok(path)
    }

    /// Stops writing; later lines are discarded until the next `open_in`.
    pub fn close(&self) {
        *self.current.lock() = None;
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().as_ref().map(|log| log.path.clone())
    }
}

impl Default for RootLog {
    fn default() -> Self {
        Self::new("Logs", "auto_sorter.log")
    }
}

impl Write for RootLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.current.lock().as_mut() {
            Some(log) => log.file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.lock().as_mut() {
            Some(log) => log.file.flush(),
            None => Ok(()),
        }
    }
}

fn console_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Console filter from `directives` (the `RUST_LOG` value), else from `verbosity`.
///
/// Directives that do not parse fall back to `verbosity` as well.
pub fn console_filter(verbosity: u8, directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(console_level(verbosity).to_string()))
}

/// Installs the global subscriber.
///
/// Both layers follow `RUST_LOG` when it is set. Otherwise the console shows
/// warnings and errors, more with `verbosity`, and the log file records `info`
/// and above.
/// Keep the returned guard alive for as long as the file should be written.
pub fn init(verbosity: u8, root_log: Option<RootLog>) -> Result<Option<WorkerGuard>, LoggingError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter(verbosity, directives.as_deref()));

    let (file_layer, guard) = match root_log {
        Some(log) => {
            let (writer, guard) = tracing_appender::non_blocking(log);
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let layer = tracing_subscriber::fmt::layer()
                .event_format(BracketFormat)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regex::Regex;
    use tempfile::TempDir;

    #[test]
    fn test_prefix_format() {
        let time = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            BracketFormat::prefix(&time, &Level::INFO),
            "[07/03/2024 09:05:02] [INFO] "
        );
        assert_eq!(
            BracketFormat::prefix(&time, &Level::ERROR),
            "[07/03/2024 09:05:02] [ERROR] "
        );
    }

    #[test]
    fn test_lines_written_to_root_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = RootLog::default();
        let path = log.open_in(temp_dir.path()).unwrap();
        assert_eq!(path, temp_dir.path().join("Logs/auto_sorter.log"));

        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(BracketFormat)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("File 'a.png' moved to 'Images'");
            tracing::error!("Error moving file 'b.pdf': denied");
        });

        let content = fs::read_to_string(&path).unwrap();
        let line = Regex::new(r"^\[\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}\] \[(INFO|ERROR)\] .+$").unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| line.is_match(l)), "{}", content);
        assert!(lines[0].ends_with("[INFO] File 'a.png' moved to 'Images'"));
        assert!(lines[1].contains("[ERROR] Error moving file 'b.pdf': denied"));
    }

    #[test]
    fn test_reopen_moves_log_to_new_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut log = RootLog::new("Logs", "sorter.log");

        log.open_in(first.path()).unwrap();
        log.write_all(b"one\n").unwrap();
        log.open_in(second.path()).unwrap();
        log.write_all(b"two\n").unwrap();

        assert_eq!(
            fs::read_to_string(first.path().join("Logs/sorter.log")).unwrap(),
            "one\n"
        );
        assert_eq!(
            fs::read_to_string(second.path().join("Logs/sorter.log")).unwrap(),
            "two\n"
        );
        assert_eq!(
            log.current_path(),
            Some(second.path().join("Logs/sorter.log"))
        );
    }

    #[test]
    fn test_closed_log_discards_writes() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = RootLog::default();
        let path = log.open_in(temp_dir.path()).unwrap();
        log.close();

        log.write_all(b"dropped\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
        assert!(log.current_path().is_none());
    }

    #[test]
    fn test_console_filter_follows_verbosity() {
        assert_eq!(console_filter(0, None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(console_filter(1, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(console_filter(2, None).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(console_filter(5, None).max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_console_filter_prefers_rust_log_directives() {
        assert_eq!(
            console_filter(0, Some("trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            console_filter(3, Some("error")).max_level_hint(),
            Some(LevelFilter::ERROR)
        );
    }

    #[test]
    fn test_console_filter_ignores_bad_directives() {
        assert_eq!(
            console_filter(1, Some("autosort=notalevel")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }
}
