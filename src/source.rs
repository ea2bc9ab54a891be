//! Named, hierarchical log sources.
//!
//! A source named `a.b.c` has the ancestors `a.b`, `a` and the root `""`.
//! Events emitted on a source are delivered to its own sinks and then, while
//! the propagate flag of the source just visited is set, to the sinks of its
//! nearest existing ancestors.

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::level::LogLevel;
use crate::record::{LogEvent, Location};
use crate::sink::{same_sink, SinkRef};

/// Name of the root source.
pub const ROOT: &str = "";

/// A single named source.
pub struct Source {
    name: String,
    level: AtomicU32,
    propagate: AtomicBool,
    sinks: RwLock<Vec<SinkRef>>,
}

impl Source {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            level: AtomicU32::new(0),
            propagate: AtomicBool::new(true),
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own level; `0` means "inherit from the nearest ancestor".
    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level.value(), Ordering::Relaxed);
    }

    pub fn propagate(&self) -> bool {
        self.propagate.load(Ordering::Acquire)
    }

    pub fn set_propagate(&self, propagate: bool) {
        self.propagate.store(propagate, Ordering::Release);
    }

    /// Snapshot of the attached sinks, in attachment order.
    pub fn sinks(&self) -> Vec<SinkRef> {
        self.sinks.read().clone()
    }

    /// Append `sink` unless this exact sink is already attached.
    pub fn add_sink(&self, sink: SinkRef) {
        let mut sinks = self.sinks.write();
        if !sinks.iter().any(|s| same_sink(s, &sink)) {
            sinks.push(sink);
        }
    }

    /// Remove `sink` if attached.
    pub fn remove_sink(&self, sink: &SinkRef) {
        self.sinks.write().retain(|s| !same_sink(s, sink));
    }

    pub fn has_sinks(&self) -> bool {
        !self.sinks.read().is_empty()
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("propagate", &self.propagate())
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

/// Process-wide default registry.
static GLOBAL_REGISTRY: Lazy<Arc<SourceRegistry>> = Lazy::new(|| Arc::new(SourceRegistry::new()));

/// Registry of sources, keyed by dotted name.
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<Source>>>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    /// Create an isolated registry holding only the root source.
    pub fn new() -> Self {
        let mut sources = HashMap::new();
        sources.insert(ROOT.to_string(), Arc::new(Source::new(ROOT)));
        Self {
            sources: RwLock::new(sources),
        }
    }

    /// Registry shared by the whole process.
    pub fn global() -> &'static Arc<SourceRegistry> {
        &GLOBAL_REGISTRY
    }

    /// Get the source called `name`, creating it on first use.
    pub fn source(&self, name: &str) -> Arc<Source> {
        if let Some(source) = self.sources.read().get(name) {
            return Arc::clone(source);
        }
        let mut sources = self.sources.write();
        Arc::clone(
            sources
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Source::new(name))),
        )
    }

    pub fn root(&self) -> Arc<Source> {
        self.source(ROOT)
    }

    /// Look up a source without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Source>> {
        self.sources.read().get(name).cloned()
    }

    /// Nearest existing ancestor of `name`.
    pub fn parent(&self, name: &str) -> Option<Arc<Source>> {
        if name == ROOT {
            return None;
        }
        let mut current = name;
        while let Some((prefix, _)) = current.rsplit_once('.') {
            if let Some(source) = self.get(prefix) {
                return Some(source);
            }
            current = prefix;
        }
        self.get(ROOT)
    }

    /// First non-zero level found walking from `source` to the root.
    pub fn effective_level(&self, source: &Source) -> u32 {
        let own = source.level();
        if own != 0 {
            return own;
        }
        let mut current = self.parent(source.name());
        while let Some(s) = current {
            let level = s.level();
            if level != 0 {
                return level;
            }
            current = self.parent(s.name());
        }
        0
    }

    /// Emit an event on the source called `name`.
    ///
    /// Events below the source's effective level are dropped. Sinks are
    /// invoked outside of any registry lock, so a sink may itself add or
    /// remove sinks or emit further events.
    pub fn emit(
        &self,
        name: &str,
        level: u32,
        message: impl Into<String>,
        location: Location,
        extra: BTreeMap<String, serde_json::Value>,
    ) {
        let origin = self.source(name);
        if level < self.effective_level(&origin) {
            return;
        }

        let event = LogEvent {
            source: name.to_string(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
            location,
            extra,
        };

        let mut current = Some(origin);
        while let Some(source) = current {
            for sink in source.sinks() {
                if level >= sink.level() {
                    sink.emit(&event);
                }
            }
            if !source.propagate() {
                break;
            }
            current = self.parent(source.name());
        }
    }

    /// Shorthand for [`SourceRegistry::emit`] with a standard level and no
    /// extra fields.
    pub fn log(&self, name: &str, level: LogLevel, message: impl Into<String>, location: Location) {
        self.emit(name, level.value(), message, location, BTreeMap::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn source_is_created_once() {
        let registry = SourceRegistry::new();
        let a = registry.source("uvicorn.error");
        let b = registry.source("uvicorn.error");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn parent_skips_missing_levels() {
        let registry = SourceRegistry::new();
        registry.source("a");
        assert_eq!(registry.parent("a.b.c").unwrap().name(), "a");
        assert_eq!(registry.parent("x.y").unwrap().name(), ROOT);
        assert!(registry.parent(ROOT).is_none());
    }

    #[test]
    fn add_sink_ignores_duplicates() {
        let registry = SourceRegistry::new();
        let source = registry.source("svc");
        let sink: SinkRef = MemorySink::new();
        source.add_sink(Arc::clone(&sink));
        source.add_sink(Arc::clone(&sink));
        assert_eq!(source.sinks().len(), 1);
        source.remove_sink(&sink);
        source.remove_sink(&sink);
        assert!(!source.has_sinks());
    }

    #[test]
    fn propagation_stops_at_flag() {
        let registry = SourceRegistry::new();
        let root_sink = MemorySink::new();
        let parent_sink = MemorySink::new();
        registry.root().add_sink(root_sink.clone());
        registry.source("svc").add_sink(parent_sink.clone());

        registry.log("svc.worker", LogLevel::Info, "first", Location::default());
        assert_eq!(parent_sink.len(), 1);
        assert_eq!(root_sink.len(), 1);

        registry.source("svc").set_propagate(false);
        registry.log("svc.worker", LogLevel::Info, "second", Location::default());
        assert_eq!(parent_sink.len(), 2);
        assert_eq!(root_sink.len(), 1);
        assert_eq!(parent_sink.events()[1].source, "svc.worker");
    }

    #[test]
    fn effective_level_filters() {
        let registry = SourceRegistry::new();
        let sink = MemorySink::new();
        registry.source("svc").set_level(LogLevel::Warning);
        registry.source("svc").add_sink(sink.clone());

        registry.log("svc.db", LogLevel::Info, "dropped", Location::default());
        registry.log("svc.db", LogLevel::Error, "kept", Location::default());
        assert_eq!(sink.messages(), vec!["kept"]);
    }

    #[test]
    fn sink_threshold_applies_per_sink() {
        let registry = SourceRegistry::new();
        let all = MemorySink::new();
        let errors_only = crate::sink::StderrSink::with_level(LogLevel::Error.value());
        let source = registry.source("svc");
        source.add_sink(all.clone());
        source.add_sink(errors_only.clone());
        assert_eq!(source.sinks()[1].level(), 40);
        registry.log("svc", LogLevel::Debug, "quiet", Location::default());
        assert_eq!(all.len(), 1);
    }
}
