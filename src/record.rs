use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::level::level_name;

/// Where an event was emitted from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// Captures the call site of the macro invocation.
#[macro_export]
macro_rules! here {
    () => {
        $crate::record::Location::new(file!(), line!(), module_path!())
    };
}

/// Raw event as produced by a [`crate::source::SourceRegistry`] and handed
/// to every [`crate::sink::Sink`] on the emission path.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Name of the source the event was emitted on (not the ancestor that
    /// happens to be dispatching it).
    pub source: String,
    pub level: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Captured record delivered to listener callbacks. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub source: String,
    pub level: u32,
    pub level_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub file: String,
    pub line: u32,
    pub function: String,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    pub fn from_event(event: &LogEvent) -> Self {
        LogRecord {
            source: event.source.clone(),
            level: event.level,
            level_name: level_name(event.level),
            message: event.message.clone(),
            timestamp: event.timestamp,
            file: event.location.file.clone(),
            line: event.location.line,
            function: event.location.function.clone(),
            extra: event.extra.clone(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.file.clone(), self.line, self.function.clone())
    }
}
