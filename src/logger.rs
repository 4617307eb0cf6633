use crate::call::{Arg, LogCall};
use crate::env::{env_opt, env_or, DEFAULT_MODE, LOG_LEVEL_ENV, LOG_MODE_ENV};
use crate::inspect::{inspect, INSPECT_DEPTH};
use crate::record::Record;
use crate::severity::{threshold_for, Severity};
use crate::sink::{LogSink, StdoutSink};
use chrono::{Local, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// How records are rendered before they reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One compact JSON object per line, RFC 3339 UTC timestamps.
    Production,
    /// Multi-line inspection output with local timestamps.
    #[default]
    Development,
}

impl OutputMode {
    /// `"development"` selects [`OutputMode::Development`]; any other value
    /// selects [`OutputMode::Production`].
    pub fn from_env_value(value: &str) -> Self {
        if value == "development" {
            OutputMode::Development
        } else {
            OutputMode::Production
        }
    }

    fn timestamp(self) -> String {
        match self {
            OutputMode::Production => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            OutputMode::Development => Local::now().format("%a %b %d %Y %H:%M:%S GMT%z").to_string(),
        }
    }
}

/// Configuration for [`Logger`].
///
/// **Fields**
/// - `level`: name of the minimum severity to emit. `None` or an unknown
///   name emits everything.
/// - `mode`: output rendering, see [`OutputMode`].
/// - `sink`: destination of formatted records. Defaults to stdout.
#[derive(Clone, Default)]
pub struct LoggerConfig {
    pub level: Option<String>,
    pub mode: OutputMode,
    pub sink: Option<Arc<dyn LogSink>>,
}

impl LoggerConfig {
    /// Build a configuration from `LOG_LEVEL` and `LOG_MODE`.
    ///
    /// An unset `LOG_MODE` means development.
    pub fn from_env() -> Self {
        LoggerConfig {
            level: env_opt(LOG_LEVEL_ENV),
            mode: OutputMode::from_env_value(&env_or(LOG_MODE_ENV, DEFAULT_MODE)),
            sink: None,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("level", &self.level)
            .field("mode", &self.mode)
            .field("sink", &self.sink.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

/// Structured event logger.
///
/// Cloning is cheap: clones share the same sink and configuration.
#[derive(Clone)]
pub struct Logger {
    threshold: u8,
    mode: OutputMode,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        Logger {
            threshold: threshold_for(config.level.as_deref()),
            mode: config.mode,
            sink: config.sink.unwrap_or_else(|| Arc::new(StdoutSink)),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Whether a call at `severity` would be emitted.
    pub fn enabled(&self, severity: Severity) -> bool {
        severity.rank() >= self.threshold
    }

    pub fn debug(&self, call: impl Into<LogCall>) {
        self.log(Severity::Debug, call);
    }

    pub fn trace(&self, call: impl Into<LogCall>) {
        self.log(Severity::Trace, call);
    }

    pub fn info(&self, call: impl Into<LogCall>) {
        self.log(Severity::Info, call);
    }

    pub fn warn(&self, call: impl Into<LogCall>) {
        self.log(Severity::Warn, call);
    }

    pub fn error(&self, call: impl Into<LogCall>) {
        self.log(Severity::Error, call);
    }

    /// Emit `call` at `severity` if it passes the threshold.
    ///
    /// The conversion into [`LogCall`] only happens once the call is known
    /// to be emitted.
    pub fn log(&self, severity: Severity, call: impl Into<LogCall>) {
        if !self.enabled(severity) {
            return;
        }
        self.write(Record::from_call(severity, call.into()).into_map());
    }

    /// Emit a variadic call, classified by [`LogCall::classify`].
    pub fn log_args(&self, severity: Severity, args: Vec<Arg>) {
        if !self.enabled(severity) {
            return;
        }
        self.write(Record::from_call(severity, LogCall::classify(args)).into_map());
    }

    /// Timestamp, render and hand off a record.
    ///
    /// This is the single write path for direct calls, the request
    /// middleware and the `tracing` bridge. `timestamp` is layered under
    /// the given fields, so an explicit `timestamp` in `fields` wins.
    /// Sink failures are reported on stderr and otherwise ignored.
    pub fn write(&self, fields: Map<String, Value>) {
        let mut record = Map::with_capacity(fields.len() + 1);
        record.insert("timestamp".to_string(), Value::String(self.mode.timestamp()));
        record.extend(fields);

        let line = self.render(record);
        if let Err(e) = self.sink.write_line(&line) {
            eprintln!("log sink write failed: {}", e);
        }
    }

    fn render(&self, record: Map<String, Value>) -> String {
        match self.mode {
            OutputMode::Production => {
                serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string())
            }
            OutputMode::Development => {
                format!("\n{}", inspect(&Value::Object(record), INSPECT_DEPTH))
            }
        }
    }

    /// Flush the underlying sink.
    pub fn flush(&self) {
        if let Err(e) = self.sink.flush() {
            eprintln!("log sink flush failed: {}", e);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(LoggerConfig::default())
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("threshold", &self.threshold)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Log a variadic call through a [`Logger`] at an explicit severity.
///
/// Arguments are converted with [`Arg::from`] only when the severity
/// passes the logger's threshold.
///
/// ```
/// use reqlog::{log_args, Logger, Severity};
/// let logger = Logger::default();
/// log_args!(logger, Severity::Info, "listening on %s:%d", "127.0.0.1", 8080);
/// ```
#[macro_export]
macro_rules! log_args {
    ($logger:expr, $severity:expr $(, $arg:expr)* $(,)?) => {{
        let logger = &$logger;
        let severity = $severity;
        if logger.enabled(severity) {
            logger.log_args(severity, ::std::vec![$($crate::Arg::from($arg)),*]);
        }
    }};
}

#[macro_export]
macro_rules! debug {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log_args!($logger, $crate::Severity::Debug $(, $arg)*)
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log_args!($logger, $crate::Severity::Trace $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log_args!($logger, $crate::Severity::Info $(, $arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log_args!($logger, $crate::Severity::Warn $(, $arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr $(, $arg:expr)* $(,)?) => {
        $crate::log_args!($logger, $crate::Severity::Error $(, $arg)*)
    };
}
