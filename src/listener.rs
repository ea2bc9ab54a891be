//! Process-wide log listener.
//!
//! [`LogListener`] attaches a capturing sink to every watched source. In
//! shadow mode (`intercept = false`) it is an extra, silent observer: the
//! source keeps its sinks and propagation. In intercept mode it becomes the
//! exclusive observer until detached, at which point the source's original
//! sinks (same handles, same order) and propagate flag are restored.
//!
//! ```no_run
//! use log_listener::{log_listener, Callback, LogLevel};
//!
//! let on_reload = Callback::new(|record| println!("reload: {}", record.message));
//! log_listener()
//!     .watch_all_http_server(true)
//!     .on_level(LogLevel::Error, Callback::new(|r| eprintln!("{}", r.message)))
//!     .on_keyword("reload", on_reload, false)?
//!     .start();
//! # Ok::<(), log_listener::ListenerError>(())
//! ```

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::dispatch::{Callback, Dispatcher};
use crate::error::ListenerError;
use crate::level::LogLevel;
use crate::record::{LogEvent, LogRecord};
use crate::sink::{Sink, SinkRef};
use crate::source::SourceRegistry;

/// Sources of the HTTP server stack: root, error and access streams.
pub const HTTP_SERVER_SOURCES: [&str; 3] = ["hyper", "hyper.server", "tower_http.trace"];

/// Sources of the file watcher used for hot reload.
pub const FILE_WATCHER_SOURCES: [&str; 2] = ["notify", "notify.watcher"];

static GLOBAL_LISTENER: OnceCell<LogListener> = OnceCell::new();

/// Sink installed on every attached source. Converts backend events into
/// [`LogRecord`]s and hands them to the dispatcher.
struct CaptureSink {
    dispatcher: Arc<Dispatcher>,
}

impl Sink for CaptureSink {
    fn emit(&self, event: &LogEvent) {
        self.dispatcher.dispatch(&LogRecord::from_event(event));
    }
}

/// What a source looked like before it was intercepted.
struct InterceptionState {
    sinks: Vec<SinkRef>,
    propagate: bool,
}

#[derive(Default)]
struct WatchState {
    /// Watched source name -> intercept flag.
    watched: BTreeMap<String, bool>,
    /// Capturing sink per attached source.
    attached: HashMap<String, SinkRef>,
    /// Present iff the source is intercepted and attached.
    saved: HashMap<String, InterceptionState>,
    running: bool,
}

/// Attaches to named sources and routes captured records to callbacks.
///
/// Every mutating method returns `&Self` so configuration can be chained.
/// Unknown names and callbacks are silently ignored.
pub struct LogListener {
    registry: Arc<SourceRegistry>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<WatchState>,
}

impl LogListener {
    /// Build a listener operating on `registry`.
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            dispatcher: Arc::new(Dispatcher::new()),
            state: Mutex::new(WatchState::default()),
        }
    }

    /// The single process-wide listener, bound to
    /// [`SourceRegistry::global`]. Initialized on first use.
    pub fn global() -> &'static LogListener {
        GLOBAL_LISTENER.get_or_init(|| LogListener::new(Arc::clone(SourceRegistry::global())))
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Watch configuration
    // ------------------------------------------------------------------

    /// Watch the source called `name`.
    ///
    /// The intercept flag always takes the new value, but a source that is
    /// already attached is not re-attached; the new flag applies from the
    /// next attachment.
    pub fn watch(&self, name: &str, intercept: bool) -> &Self {
        let mut state = self.state.lock();
        state.watched.insert(name.to_string(), intercept);
        if state.running && !state.attached.contains_key(name) {
            self.attach(&mut state, name, intercept);
        }
        self
    }

    /// Stop watching `name`, detaching and restoring it first if needed.
    pub fn unwatch(&self, name: &str) -> &Self {
        let mut state = self.state.lock();
        state.watched.remove(name);
        if state.attached.contains_key(name) {
            self.detach(&mut state, name);
        }
        self
    }

    pub fn watch_all_http_server(&self, intercept: bool) -> &Self {
        for name in HTTP_SERVER_SOURCES {
            self.watch(name, intercept);
        }
        self
    }

    pub fn watch_all_file_watcher(&self, intercept: bool) -> &Self {
        for name in FILE_WATCHER_SOURCES {
            self.watch(name, intercept);
        }
        self
    }

    /// Watched names with their intercept flag, sorted by name.
    pub fn watched(&self) -> Vec<(String, bool)> {
        self.state
            .lock()
            .watched
            .iter()
            .map(|(name, intercept)| (name.clone(), *intercept))
            .collect()
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.state.lock().attached.contains_key(name)
    }

    // ------------------------------------------------------------------
    // Callback registration
    // ------------------------------------------------------------------

    /// Fire `callback` for records whose level is exactly `level`.
    pub fn on_level(&self, level: LogLevel, callback: Callback) -> &Self {
        self.dispatcher.add_level(level.value(), callback);
        self
    }

    /// Fire `callback` when `keyword`, used as a regex search pattern,
    /// matches the record message. Unless `case_sensitive` is set, both
    /// pattern and message are lowercased before matching.
    ///
    /// An invalid pattern is rejected here rather than at dispatch time.
    pub fn on_keyword(
        &self,
        keyword: &str,
        callback: Callback,
        case_sensitive: bool,
    ) -> Result<&Self, ListenerError> {
        self.dispatcher.add_keyword(keyword, callback, case_sensitive)?;
        Ok(self)
    }

    /// Fire `callback` for every captured record, before level and keyword
    /// callbacks.
    pub fn on_any(&self, callback: Callback) -> &Self {
        self.dispatcher.add_global(callback);
        self
    }

    /// Remove `callback` from `level`, or every level callback when `None`.
    pub fn off_level(&self, level: LogLevel, callback: Option<&Callback>) -> &Self {
        self.dispatcher.remove_level(level.value(), callback);
        self
    }

    /// Remove `callback` from `keyword` (both case variants), or every
    /// callback under `keyword` when `None`.
    pub fn off_keyword(&self, keyword: &str, callback: Option<&Callback>) -> &Self {
        self.dispatcher.remove_keyword(keyword, callback);
        self
    }

    pub fn off_any(&self, callback: Option<&Callback>) -> &Self {
        self.dispatcher.remove_global(callback);
        self
    }

    pub fn clear_callbacks(&self) -> &Self {
        self.dispatcher.clear();
        self
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Attach to every watched source. No-op when already running.
    pub fn start(&self) -> &Self {
        let mut state = self.state.lock();
        if state.running {
            return self;
        }

        let pending: Vec<(String, bool)> = state
            .watched
            .iter()
            .filter(|(name, _)| !state.attached.contains_key(*name))
            .map(|(name, intercept)| (name.clone(), *intercept))
            .collect();
        for (name, intercept) in pending {
            self.attach(&mut state, &name, intercept);
        }

        state.running = true;
        debug!(sources = state.attached.len(), "log listener started");
        self
    }

    /// Detach from every attached source, restoring intercepted ones.
    /// No-op when not running.
    pub fn stop(&self) -> &Self {
        let mut state = self.state.lock();
        if !state.running {
            return self;
        }

        let names: Vec<String> = state.attached.keys().cloned().collect();
        for name in names {
            self.detach(&mut state, &name);
        }

        state.attached.clear();
        state.running = false;
        debug!("log listener stopped");
        self
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    // ------------------------------------------------------------------
    // Attach / detach
    // ------------------------------------------------------------------

    fn attach(&self, state: &mut WatchState, name: &str, intercept: bool) {
        let source = self.registry.source(name);
        let sink: SinkRef = Arc::new(CaptureSink {
            dispatcher: Arc::clone(&self.dispatcher),
        });

        if intercept {
            let saved = InterceptionState {
                sinks: source.sinks(),
                propagate: source.propagate(),
            };
            source.set_propagate(false);
            for original in &saved.sinks {
                source.remove_sink(original);
            }
            state.saved.insert(name.to_string(), saved);
        }

        source.add_sink(Arc::clone(&sink));
        state.attached.insert(name.to_string(), sink);
        debug!(source = name, intercept, "attached capture sink");
    }

    fn detach(&self, state: &mut WatchState, name: &str) {
        let Some(sink) = state.attached.remove(name) else {
            return;
        };

        let source = self.registry.source(name);
        source.remove_sink(&sink);

        if let Some(saved) = state.saved.remove(name) {
            for original in saved.sinks {
                source.add_sink(original);
            }
            source.set_propagate(saved.propagate);
        }
        debug!(source = name, "detached capture sink");
    }
}

/// The process-wide listener. Shorthand for [`LogListener::global`].
pub fn log_listener() -> &'static LogListener {
    LogListener::global()
}
