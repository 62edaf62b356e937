use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Prefix of the daily rolling log files.
pub const LOG_FILE_PREFIX: &str = "iris.log";

const MAX_CONSOLE_LINES: usize = 1000;

/// Log severity level (mirrors tracing levels for UI use).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.pad(name)
    }
}

/// A single log entry for display in the console overlay.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Shared ring buffer for log entries consumed by the console UI.
pub type LogBuffer = Arc<Mutex<VecDeque<LogEntry>>>;

pub fn new_log_buffer(capacity: usize) -> LogBuffer {
    Arc::new(Mutex::new(VecDeque::with_capacity(capacity)))
}

/// Where and how much to log. Built by the app from configuration.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directive used when neither `IRIS_LOG` nor `RUST_LOG` is set.
    pub filter: String,
    /// Explicit log directory. `IRIS_LOG_DIR` still wins over this.
    pub dir: Option<PathBuf>,
    pub retention_days: u64,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            dir: None,
            retention_days: 7,
        }
    }
}

/// Keeps the file writer flushing. Hold it until the process exits.
pub struct LogHandle {
    pub buffer: LogBuffer,
    pub dir: PathBuf,
    _guard: WorkerGuard,
}

/// Resolve the log directory.
///
/// Precedence: `IRIS_LOG_DIR` env var > `configured` > platform default.
/// macOS: `~/Library/Logs/iris/`
/// Linux: `$XDG_DATA_HOME/iris/logs/` or `~/.local/share/iris/logs/`
pub fn log_dir(configured: Option<&Path>) -> PathBuf {
    if let Ok(dir) = std::env::var("IRIS_LOG_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library").join("Logs").join("iris");
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        if let Some(data) = dirs::data_dir() {
            return data.join("iris").join("logs");
        }
    }

    PathBuf::from("logs")
}

/// Delete `iris.log*` files in `dir` last modified more than `max_age` ago.
/// Other files are left alone in case the directory is shared.
fn prune_logs(dir: &Path, max_age: Duration) {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .is_ok_and(|modified| modified < cutoff);
        if stale {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

/// A tracing layer that pushes log entries into a shared ring buffer.
struct ConsoleLayer {
    buffer: LogBuffer,
    max_lines: usize,
}

impl<S: tracing::Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            level: event.metadata().level().into(),
            target: event.metadata().target().to_string(),
            message: visitor.finish(),
        };

        if let Ok(mut buf) = self.buffer.lock() {
            if buf.len() >= self.max_lines {
                buf.pop_front();
            }
            buf.push_back(entry);
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message, self.fields.is_empty()) {
            (Some(msg), true) => msg,
            (Some(msg), false) => format!("{} {}", msg, self.fields.join(" ")),
            (None, _) => self.fields.join(" "),
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env("IRIS_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging subsystem.
///
/// Filter: `IRIS_LOG` > `RUST_LOG` > `settings.filter` > `info`.
/// File output: daily rotation in [`log_dir`], pruned to `retention_days`.
/// Console buffer: ring buffer of the last 1000 entries.
///
/// Nothing is written to the terminal, which belongs to the TUI.
pub fn init(settings: &LogSettings) -> LogHandle {
    let buffer = new_log_buffer(MAX_CONSOLE_LINES);

    let dir = log_dir(settings.dir.as_deref());
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("warning: failed to create log directory {:?}: {}", dir, e);
    }
    prune_logs(
        &dir,
        Duration::from_secs(settings.retention_days.saturating_mul(86_400)),
    );

    let (file_writer, guard) =
        tracing_appender::non_blocking(rolling::daily(&dir, LOG_FILE_PREFIX));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let console_layer = ConsoleLayer {
        buffer: buffer.clone(),
        max_lines: MAX_CONSOLE_LINES,
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.filter))
        .with(file_layer)
        .with(console_layer)
        .init();

    LogHandle {
        buffer,
        dir,
        _guard: guard,
    }
}
