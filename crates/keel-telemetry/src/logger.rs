//! Multi-level logger.
//!
//! A [`Logger`] routes each [`Entry`] to the writers registered for the
//! entry's [`Level`]. Writers serialize their own output: [`ConsoleWriter`]
//! behind a mutex, [`FileWriter`] on a dedicated thread so callers never
//! wait on disk I/O.
//!
//! [`LevelLayer`] feeds `tracing` events into a logger, so code keeps using
//! the `tracing` macros and the logger decides where lines end up.
//!
//! # Example
//!
//! ```rust
//! use keel_telemetry::logger::{ConsoleWriter, Level, Logger};
//! use std::sync::Arc;
//!
//! let console = Arc::new(ConsoleWriter::stderr());
//! let logger = Logger::builder()
//!     .writer_for_all(console)
//!     .build();
//!
//! logger.info("app", "service started");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Something unexpected that was handled
    Warn,
    /// A failure
    Error,
}

impl Level {
    /// Every level, lowest first.
    pub const ALL: [Level; 4] = [Level::Debug, Level::Info, Level::Warn, Level::Error];

    /// Upper-case tag used in text output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// Severity
    pub level: Level,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Emitting component, usually a module path
    pub target: String,
    /// Human-readable message
    pub message: String,
    /// Structured fields
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl Entry {
    /// Creates an entry stamped now.
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    /// Single-line text rendering.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} [{}] {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.target,
            self.message
        );
        for (key, value) in &self.fields {
            let _ = write!(line, " {key}={value}");
        }
        line
    }

    /// Single-line JSON rendering.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_line())
    }
}

/// A sink for log entries.
pub trait LogWriter: Send + Sync {
    /// Writes one entry.
    fn write(&self, entry: &Entry) -> TelemetryResult<()>;

    /// Flushes buffered output.
    fn flush(&self) -> TelemetryResult<()> {
        Ok(())
    }
}

/// Line output to a process stream or any `Write`, one line at a time.
pub struct ConsoleWriter {
    out: Mutex<Box<dyn Write + Send>>,
    json: bool,
}

impl ConsoleWriter {
    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Writes to standard error.
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    /// Writes to an arbitrary sink.
    pub fn from_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            json: false,
        }
    }

    /// Switches to JSON lines.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

impl fmt::Debug for ConsoleWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleWriter").field("json", &self.json).finish()
    }
}

impl LogWriter for ConsoleWriter {
    fn write(&self, entry: &Entry) -> TelemetryResult<()> {
        let line = if self.json { entry.to_json() } else { entry.to_line() };
        let mut out = self.out.lock();
        writeln!(out, "{line}")?;
        Ok(())
    }

    fn flush(&self) -> TelemetryResult<()> {
        self.out.lock().flush()?;
        Ok(())
    }
}

enum FileCommand {
    Line(String),
    Flush(mpsc::Sender<io::Result<()>>),
}

/// Appends entries to a file from a background thread.
///
/// `write` only queues the line. Dropping the writer drains the queue and
/// joins the thread.
pub struct FileWriter {
    path: PathBuf,
    sender: Mutex<Option<mpsc::Sender<FileCommand>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    json: bool,
}

impl FileWriter {
    /// Opens (creating if needed) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> TelemetryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let (sender, receiver) = mpsc::channel::<FileCommand>();
        let display = path.display().to_string();

        // Worker failures go to stderr; a LevelLayer may feed this writer.
        let worker = thread::Builder::new()
            .name("keel-log-file".to_string())
            .spawn(move || {
                let mut out = BufWriter::new(file);
                let mut failed: Option<io::Error> = None;
                let mut dropped = 0_u64;
                for command in receiver {
                    match command {
                        FileCommand::Line(line) => {
                            if let Err(e) = writeln!(out, "{line}") {
                                dropped += 1;
                                if failed.is_none() {
                                    eprintln!("keel: log write to {display} failed: {e}");
                                    failed = Some(e);
                                }
                            }
                        }
                        FileCommand::Flush(ack) => {
                            let result = match failed.take() {
                                Some(e) => Err(io::Error::new(
                                    e.kind(),
                                    format!("{dropped} log line(s) dropped: {e}"),
                                )),
                                None => out.flush(),
                            };
                            dropped = 0;
                            // The caller may have stopped waiting.
                            let _ = ack.send(result);
                        }
                    }
                }
                if let Err(e) = out.flush() {
                    eprintln!("keel: final flush of {display} failed: {e}");
                }
            })?;

        Ok(Self {
            path,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            json: false,
        })
    }

    /// Switches to JSON lines.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// The file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&self, command: FileCommand) -> TelemetryResult<()> {
        let sender = self.sender.lock();
        let closed = || TelemetryError::WriterClosed(self.path.display().to_string());
        sender
            .as_ref()
            .ok_or_else(closed)?
            .send(command)
            .map_err(|_| closed())
    }
}

impl fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWriter")
            .field("path", &self.path)
            .field("json", &self.json)
            .finish()
    }
}

impl LogWriter for FileWriter {
    fn write(&self, entry: &Entry) -> TelemetryResult<()> {
        let line = if self.json { entry.to_json() } else { entry.to_line() };
        self.send(FileCommand::Line(line))
    }

    fn flush(&self) -> TelemetryResult<()> {
        let (ack, done) = mpsc::channel();
        self.send(FileCommand::Flush(ack))?;
        done.recv()
            .map_err(|_| TelemetryError::WriterClosed(self.path.display().to_string()))??;
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

/// Dispatches entries to per-level writers.
#[derive(Clone, Default)]
pub struct Logger {
    writers: Arc<HashMap<Level, Vec<Arc<dyn LogWriter>>>>,
    min_level: Option<Level>,
}

impl Logger {
    /// Starts building a logger.
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    /// Returns true if at least one writer would receive `level`.
    pub fn enabled(&self, level: Level) -> bool {
        self.min_level.map_or(true, |min| level >= min)
            && self.writers.get(&level).is_some_and(|w| !w.is_empty())
    }

    /// Sends `entry` to every writer registered for its level.
    ///
    /// All writers are attempted; the first failure is returned.
    pub fn log(&self, entry: &Entry) -> TelemetryResult<()> {
        if !self.enabled(entry.level) {
            return Ok(());
        }
        let mut first_error = None;
        if let Some(writers) = self.writers.get(&entry.level) {
            for writer in writers {
                if let Err(e) = writer.write(entry) {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flushes every writer.
    pub fn flush(&self) -> TelemetryResult<()> {
        for writers in self.writers.values() {
            for writer in writers {
                writer.flush()?;
            }
        }
        Ok(())
    }

    fn emit(&self, level: Level, target: &str, message: &str) {
        let _ = self.log(&Entry::new(level, target, message));
    }

    /// Logs at debug level.
    pub fn debug(&self, target: &str, message: &str) {
        self.emit(Level::Debug, target, message);
    }

    /// Logs at info level.
    pub fn info(&self, target: &str, message: &str) {
        self.emit(Level::Info, target, message);
    }

    /// Logs at warn level.
    pub fn warn(&self, target: &str, message: &str) {
        self.emit(Level::Warn, target, message);
    }

    /// Logs at error level.
    pub fn error(&self, target: &str, message: &str) {
        self.emit(Level::Error, target, message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<Level, usize> =
            self.writers.iter().map(|(l, w)| (*l, w.len())).collect();
        f.debug_struct("Logger")
            .field("writers", &counts)
            .field("min_level", &self.min_level)
            .finish()
    }
}

/// Builder for [`Logger`].
#[derive(Default)]
pub struct LoggerBuilder {
    writers: HashMap<Level, Vec<Arc<dyn LogWriter>>>,
    min_level: Option<Level>,
}

impl LoggerBuilder {
    /// Registers `writer` for one level.
    #[must_use]
    pub fn writer(mut self, level: Level, writer: Arc<dyn LogWriter>) -> Self {
        self.writers.entry(level).or_default().push(writer);
        self
    }

    /// Registers `writer` for every level.
    #[must_use]
    pub fn writer_for_all(mut self, writer: Arc<dyn LogWriter>) -> Self {
        for level in Level::ALL {
            self.writers.entry(level).or_default().push(Arc::clone(&writer));
        }
        self
    }

    /// Drops entries below `level`.
    #[must_use]
    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Finishes the logger.
    pub fn build(self) -> Logger {
        Logger {
            writers: Arc::new(self.writers),
            min_level: self.min_level,
        }
    }
}

/// A `tracing` layer that forwards events into a [`Logger`].
#[derive(Debug, Clone)]
pub struct LevelLayer {
    logger: Logger,
}

impl LevelLayer {
    /// Wraps `logger`.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for LevelLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(metadata.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let mut entry = Entry::new(level, metadata.target(), visitor.message);
        entry.fields = visitor.fields;
        let _ = self.logger.log(&entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl LogWriter for Capture {
        fn write(&self, entry: &Entry) -> TelemetryResult<()> {
            self.lines.lock().push((entry.level, entry.message.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_entries_reach_only_their_level() {
        let errors = Arc::new(Capture::default());
        let everything = Arc::new(Capture::default());
        let logger = Logger::builder()
            .writer(Level::Error, errors.clone())
            .writer_for_all(everything.clone())
            .build();

        logger.info("t", "hello");
        logger.error("t", "boom");

        assert_eq!(*errors.lines.lock(), vec![(Level::Error, "boom".to_string())]);
        assert_eq!(everything.lines.lock().len(), 2);
    }

    #[test]
    fn test_min_level_filters() {
        let sink = Arc::new(Capture::default());
        let logger = Logger::builder()
            .writer_for_all(sink.clone())
            .min_level(Level::Warn)
            .build();

        logger.debug("t", "noise");
        logger.info("t", "noise");
        logger.warn("t", "careful");
        assert_eq!(sink.lines.lock().len(), 1);
        assert!(!logger.enabled(Level::Info));
    }

    #[test]
    fn test_entry_line_format() {
        let entry = Entry::new(Level::Warn, "keel::cache", "slow sweep").with_field("removed", 3);
        let line = entry.to_line();
        assert!(line.contains("[WARN] keel::cache: slow sweep removed=3"));
    }

    #[test]
    fn test_entry_json() {
        let entry = Entry::new(Level::Info, "app", "up");
        let value: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(value["level"], "info");
        assert_eq!(value["message"], "up");
        assert!(value.get("fields").is_none());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_writer_lines() {
        let buf = SharedBuf::default();
        let writer = ConsoleWriter::from_writer(buf.clone());
        writer.write(&Entry::new(Level::Info, "a", "one")).unwrap();
        writer.write(&Entry::new(Level::Info, "a", "two")).unwrap();

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("a: two\n"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_file_writer_reports_failed_lines_on_flush() {
        let writer = FileWriter::open("/dev/full").unwrap();
        // Longer than the buffer, so the write reaches the device at once.
        let long = "x".repeat(64 * 1024);
        writer.write(&Entry::new(Level::Info, "a", long)).unwrap();

        let err = writer.flush().unwrap_err();
        assert!(err.to_string().contains("1 log line(s) dropped"));

        // The failure is reported once.
        writer.flush().unwrap();
    }

    #[test]
    fn test_file_writer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = FileWriter::open(&path).unwrap();
        writer.write(&Entry::new(Level::Info, "a", "one")).unwrap();
        writer.write(&Entry::new(Level::Error, "a", "two")).unwrap();
        writer.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("[ERROR] a: two"));
    }

    #[test]
    fn test_level_layer_forwards_events() {
        use tracing_subscriber::layer::SubscriberExt;

        let sink = Arc::new(Capture::default());
        let logger = Logger::builder().writer_for_all(sink.clone()).build();
        let subscriber = tracing_subscriber::registry().with(LevelLayer::new(logger));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(key = "v", "watch out");
            tracing::trace!("very fine");
        });

        let lines = sink.lines.lock();
        assert_eq!(lines[0], (Level::Warn, "watch out".to_string()));
        assert_eq!(lines[1].0, Level::Debug);
    }
}
