#![forbid(unsafe_code)]

//! Per-object logging tagged with the emitting class name.
//!
//! Objects emit through [`LogSupport`] (or a standalone [`ClassLogger`]); each
//! event is a regular `tracing` event carrying a `class` field. The
//! [`ClassLogLayer`] renders those events as
//!
//! ```text
//! 2026-01-31 12:00:00 (INFO) (MainController) window shown
//! ```
//!
//! and writes them to the configured output. [`install`] wires the layer into
//! the global subscriber.
//!
//! # Failure Modes
//!
//! | Failure                    | Behavior                                          |
//! |----------------------------|---------------------------------------------------|
//! | Log file cannot be opened  | Falls back to stderr at `WARN`, reports the cause |
//! | Invalid timestamp format   | Default format is used for that line              |
//! | Subscriber already set     | [`LogSetupError::AlreadyInstalled`]               |

use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::naming::short_type_name;

/// Field name carrying the emitting class.
pub const CLASS_FIELD: &str = "class";

/// Default `strftime` pattern for line timestamps.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warn,
    Error,
    /// Rendered as `FATAL`; emitted at `ERROR` with `fatal = true`.
    Fatal,
}

impl LogLevel {
    /// Label used in the rendered line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    fn from_event(level: &tracing::Level, fatal: bool) -> Self {
        if fatal {
            return Self::Fatal;
        }
        if *level == tracing::Level::ERROR {
            Self::Error
        } else if *level == tracing::Level::WARN {
            Self::Warn
        } else if *level == tracing::Level::INFO {
            Self::Info
        } else {
            Self::Debug
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LogLevel {
    type Err = LogSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            _ => Err(LogSetupError::UnknownLevel(s.to_string())),
        }
    }
}

/// Where rendered lines go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// A file name, resolved inside [`LoggerConfig::log_dir`].
    File(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub output: LogOutput,
    /// Lines below this level are discarded.
    pub level: LogLevel,
    pub timestamp_format: String,
    /// Directory that [`LogOutput::File`] names are resolved against.
    pub log_dir: PathBuf,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stdout,
            level: LogLevel::Debug,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            log_dir: PathBuf::from("log"),
        }
    }
}

impl LoggerConfig {
    #[must_use]
    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Full path of the log file, if the output is a file.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        match &self.output {
            LogOutput::File(name) => Some(self.log_dir.join(name)),
            _ => None,
        }
    }
}

/// Errors from logging setup.
#[derive(Debug)]
pub enum LogSetupError {
    /// The log file could not be opened.
    Open { path: PathBuf, source: io::Error },
    /// A global subscriber was already installed.
    AlreadyInstalled,
    /// A level name was not recognized.
    UnknownLevel(String),
}

impl fmt::Display for LogSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open log file {}: {source}", path.display())
            }
            Self::AlreadyInstalled => f.write_str("a global tracing subscriber is already set"),
            Self::UnknownLevel(level) => write!(f, "unknown log level: {level}"),
        }
    }
}

impl std::error::Error for LogSetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Render one log line (newline included).
#[must_use]
pub fn format_line(timestamp: &str, level: LogLevel, class: &str, message: &str) -> String {
    format!("{timestamp} ({level}) ({class}) {message}\n")
}

fn render_timestamp(format: &str) -> String {
    let now = chrono::Local::now();
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", now.format(DEFAULT_TIMESTAMP_FORMAT));
    }
    out
}

/// `tracing` layer rendering class-tagged lines.
///
/// Events without a `class` field use their target as the class name.
pub struct ClassLogLayer {
    sink: Mutex<Box<dyn Write + Send>>,
    level: LogLevel,
    timestamp_format: String,
}

impl fmt::Debug for ClassLogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassLogLayer")
            .field("level", &self.level)
            .field("timestamp_format", &self.timestamp_format)
            .finish_non_exhaustive()
    }
}

impl ClassLogLayer {
    /// Layer writing to an arbitrary sink.
    pub fn new(
        writer: impl Write + Send + 'static,
        level: LogLevel,
        timestamp_format: impl Into<String>,
    ) -> Self {
        Self {
            sink: Mutex::new(Box::new(writer)),
            level,
            timestamp_format: timestamp_format.into(),
        }
    }

    /// Layer for the output described by `config`.
    pub fn from_config(config: &LoggerConfig) -> Result<Self, LogSetupError> {
        let writer: Box<dyn Write + Send> = match &config.output {
            LogOutput::Stdout => Box::new(io::stdout()),
            LogOutput::Stderr => Box::new(io::stderr()),
            LogOutput::File(name) => {
                let path = config.log_dir.join(name);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|source| LogSetupError::Open { path, source })?;
                Box::new(file)
            }
        };
        Ok(Self {
            sink: Mutex::new(writer),
            level: config.level,
            timestamp_format: config.timestamp_format.clone(),
        })
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.level
    }
}

#[derive(Default)]
struct LineVisitor {
    class: Option<String>,
    message: Option<String>,
    fatal: bool,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            CLASS_FIELD => self.class = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "fatal" {
            self.fatal = value;
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            CLASS_FIELD => self.class = Some(format!("{value:?}").trim_matches('"').to_string()),
            "message" => self.message = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S: Subscriber> Layer<S> for ClassLogLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let level = LogLevel::from_event(event.metadata().level(), visitor.fatal);
        if level < self.level {
            return;
        }

        let class = visitor
            .class
            .unwrap_or_else(|| event.metadata().target().to_string());
        let line = format_line(
            &render_timestamp(&self.timestamp_format),
            level,
            &class,
            visitor.message.as_deref().unwrap_or_default(),
        );

        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        let _ = sink.write_all(line.as_bytes());
        let _ = sink.flush();
    }
}

/// Install the class-tagged line layer as the global subscriber.
///
/// If the configured output cannot be opened, lines go to stderr at `WARN`
/// instead and the cause is logged. Returns the configuration in effect.
pub fn install(config: &LoggerConfig) -> Result<LoggerConfig, LogSetupError> {
    let (layer, effective, failure) = match ClassLogLayer::from_config(config) {
        Ok(layer) => (layer, config.clone(), None),
        Err(err) => {
            let fallback = config
                .clone()
                .with_output(LogOutput::Stderr)
                .with_level(LogLevel::Warn);
            let layer = ClassLogLayer::new(
                io::stderr(),
                fallback.level,
                fallback.timestamp_format.clone(),
            );
            (layer, fallback, Some(err))
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|_| LogSetupError::AlreadyInstalled)?;

    if let Some(err) = failure {
        let logger = ClassLogger::new("LogSupport");
        logger.warn(
            "Log support problems: the log level has been raised to WARN and the output \
             directed to STDERR until the problem is fixed.",
        );
        logger.error(&err.to_string());
    }
    Ok(effective)
}

/// Emit a class-tagged event.
pub fn emit(class: &str, level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(class = class, "{message}"),
        LogLevel::Info => tracing::info!(class = class, "{message}"),
        LogLevel::Warn => tracing::warn!(class = class, "{message}"),
        LogLevel::Error => tracing::error!(class = class, "{message}"),
        LogLevel::Fatal => tracing::error!(class = class, fatal = true, "{message}"),
    }
}

/// Logging mixin for application objects.
///
/// ```ignore
/// struct MainController;
/// impl LogSupport for MainController {}
///
/// MainController.info("window shown"); // "... (INFO) (MainController) window shown"
/// ```
pub trait LogSupport {
    /// Name tagged on every line. Defaults to the implementor's type name
    /// without its module path.
    fn class_name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn log(&self, level: LogLevel, message: &str) {
        emit(self.class_name(), level, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }
}

/// A logger with an explicit class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLogger {
    class: String,
}

impl ClassLogger {
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }

    /// Logger named after `T`.
    #[must_use]
    pub fn for_type<T: ?Sized>() -> Self {
        Self::new(short_type_name(std::any::type_name::<T>()))
    }
}

impl LogSupport for ClassLogger {
    fn class_name(&self) -> &str {
        &self.class
    }
}
