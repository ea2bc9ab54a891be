use std::fmt;
use std::str::FromStr;

/// Severity of a log event.
///
/// Numeric values leave gaps so that sources may emit custom levels in
/// between (for example `25`); such records still reach `on_any` and keyword
/// callbacks, they simply never equal one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Numeric severity carried by records.
    pub fn value(self) -> u32 {
        match self {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warning => 30,
            LogLevel::Error => 40,
            LogLevel::Critical => 50,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Exact reverse of [`LogLevel::value`].
    pub fn from_value(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.value() == value)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level name: {0}")]
pub struct LevelParseError(pub String);

impl FromStr for LogLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" | "fatal" => Ok(LogLevel::Critical),
            _ => Err(LevelParseError(s.to_string())),
        }
    }
}

/// Display name for an arbitrary numeric level.
pub fn level_name(value: u32) -> String {
    match LogLevel::from_value(value) {
        Some(level) => level.name().to_string(),
        None => format!("Level {}", value),
    }
}
