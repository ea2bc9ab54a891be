use crate::level::level_name;
use crate::record::LogEvent;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Consumer attached to a [`crate::source::Source`].
///
/// The registry calls `emit` synchronously on the thread that produced the
/// event, for every source on the propagation path that holds this sink.
/// Implementations must not block for long and must not panic.
pub trait Sink: Send + Sync {
    /// Receive a single event.
    fn emit(&self, event: &LogEvent);

    /// Minimal numeric level this sink accepts.
    ///
    /// Default implementation accepts every level.
    fn level(&self) -> u32 {
        0
    }
}

/// Shared sink handle. Identity is pointer identity.
pub type SinkRef = Arc<dyn Sink>;

/// Pointer identity of two sink handles.
pub fn same_sink(a: &SinkRef, b: &SinkRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A sink that keeps every event it receives in memory.
///
/// Useful in tests and for short diagnostic captures.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Sink for MemorySink {
    fn emit(&self, event: &LogEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Writes `timestamp - source - LEVEL - message` lines to stderr.
#[derive(Debug, Clone, Default)]
pub struct StderrSink {
    min_level: u32,
}

impl StderrSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_level(min_level: u32) -> Arc<Self> {
        Arc::new(Self { min_level })
    }

    pub fn format(event: &LogEvent) -> String {
        format!(
            "{} - {} - {} - {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            event.source,
            level_name(event.level),
            event.message
        )
    }
}

impl Sink for StderrSink {
    fn emit(&self, event: &LogEvent) {
        let line = Self::format(event);
        let mut stderr = std::io::stderr().lock();
        // Nothing sensible to do if stderr is gone.
        let _ = writeln!(stderr, "{}", line);
    }

    fn level(&self) -> u32 {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Location;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn event(message: &str) -> LogEvent {
        LogEvent {
            source: "hyper.server".to_string(),
            level: 30,
            message: message.to_string(),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            location: Location::default(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(&event("one"));
        sink.emit(&event("two"));
        assert_eq!(sink.messages(), vec!["one", "two"]);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn stderr_format_contains_all_parts() {
        let line = StderrSink::format(&event("listening"));
        assert_eq!(line, "2024-05-01 12:00:00,000 - hyper.server - WARNING - listening");
    }

    #[test]
    fn identity_is_per_allocation() {
        let a: SinkRef = MemorySink::new();
        let b: SinkRef = MemorySink::new();
        let a2 = Arc::clone(&a);
        assert!(same_sink(&a, &a2));
        assert!(!same_sink(&a, &b));
    }
}
