//! Callback registries and the per-record dispatch sequence.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::borrow::Cow;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::ListenerError;
use crate::record::LogRecord;

/// Handle to a registered callback.
///
/// Handles compare by identity: to unregister a single callback, pass back
/// a clone of the handle that was registered. Two handles built from
/// behaviorally identical closures are different callbacks.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&LogRecord) + Send + Sync>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        Callback(Arc::new(f))
    }

    pub fn call(&self, record: &LogRecord) {
        (self.0)(record)
    }

    /// Whether both handles refer to the same registration.
    pub fn same_as(&self, other: &Callback) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0))
    }
}

struct KeywordEntry {
    callback: Callback,
    case_sensitive: bool,
    pattern: Regex,
}

/// All entries registered under one keyword string, in registration order.
struct KeywordSlot {
    keyword: String,
    entries: Vec<KeywordEntry>,
}

#[derive(Default)]
struct Registries {
    level: HashMap<u32, Vec<Callback>>,
    keyword: Vec<KeywordSlot>,
    global: Vec<Callback>,
}

/// Owner of the three callback registries.
///
/// A single lock guards registration, removal and the whole dispatch of a
/// record, so concurrent records never interleave their callback sequences.
/// Callbacks therefore must not register or remove callbacks on the same
/// dispatcher; doing so deadlocks.
#[derive(Default)]
pub struct Dispatcher {
    registries: Mutex<Registries>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_level(&self, level: u32, callback: Callback) {
        self.registries.lock().level.entry(level).or_default().push(callback);
    }

    pub fn add_keyword(
        &self,
        keyword: &str,
        callback: Callback,
        case_sensitive: bool,
    ) -> Result<(), ListenerError> {
        let text: Cow<'_, str> = if case_sensitive {
            Cow::Borrowed(keyword)
        } else {
            Cow::Owned(keyword.to_lowercase())
        };
        let pattern = Regex::new(&text).map_err(|source| ListenerError::InvalidKeyword {
            keyword: keyword.to_string(),
            source,
        })?;
        let entry = KeywordEntry {
            callback,
            case_sensitive,
            pattern,
        };

        let mut registries = self.registries.lock();
        match registries.keyword.iter_mut().find(|s| s.keyword == keyword) {
            Some(slot) => slot.entries.push(entry),
            None => registries.keyword.push(KeywordSlot {
                keyword: keyword.to_string(),
                entries: vec![entry],
            }),
        }
        Ok(())
    }

    pub fn add_global(&self, callback: Callback) {
        self.registries.lock().global.push(callback);
    }

    pub fn remove_level(&self, level: u32, callback: Option<&Callback>) {
        let mut registries = self.registries.lock();
        if let Some(callbacks) = registries.level.get_mut(&level) {
            match callback {
                Some(target) => callbacks.retain(|cb| !cb.same_as(target)),
                None => callbacks.clear(),
            }
        }
    }

    pub fn remove_keyword(&self, keyword: &str, callback: Option<&Callback>) {
        let mut registries = self.registries.lock();
        if let Some(slot) = registries.keyword.iter_mut().find(|s| s.keyword == keyword) {
            match callback {
                Some(target) => slot.entries.retain(|e| !e.callback.same_as(target)),
                None => slot.entries.clear(),
            }
        }
    }

    pub fn remove_global(&self, callback: Option<&Callback>) {
        let mut registries = self.registries.lock();
        match callback {
            Some(target) => registries.global.retain(|cb| !cb.same_as(target)),
            None => registries.global.clear(),
        }
    }

    pub fn clear(&self) {
        let mut registries = self.registries.lock();
        registries.level.clear();
        registries.keyword.clear();
        registries.global.clear();
    }

    /// Number of registrations across all three registries.
    pub fn len(&self) -> usize {
        let registries = self.registries.lock();
        registries.global.len()
            + registries.level.values().map(Vec::len).sum::<usize>()
            + registries.keyword.iter().map(|s| s.entries.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route one record: global callbacks, then callbacks for the record's
    /// exact level, then every matching keyword entry.
    pub fn dispatch(&self, record: &LogRecord) {
        let registries = self.registries.lock();

        for callback in &registries.global {
            safe_call(callback, record);
        }

        if let Some(callbacks) = registries.level.get(&record.level) {
            for callback in callbacks {
                safe_call(callback, record);
            }
        }

        let mut lowered: Option<String> = None;
        for slot in &registries.keyword {
            for entry in &slot.entries {
                let message = if entry.case_sensitive {
                    record.message.as_str()
                } else {
                    lowered.get_or_insert_with(|| record.message.to_lowercase()).as_str()
                };
                if entry.pattern.is_match(message) {
                    safe_call(&entry.callback, record);
                }
            }
        }
    }
}

thread_local! {
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Panic hook that stays silent while a callback runs on the current thread
/// and defers to the previously installed hook otherwise.
static QUIET_HOOK: Lazy<()> = Lazy::new(|| {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if !IN_CALLBACK.with(Cell::get) {
            previous(info);
        }
    }));
});

/// Whether the current thread is inside a callback invocation.
pub(crate) fn in_callback() -> bool {
    IN_CALLBACK.with(Cell::get)
}

/// Run a callback, discarding any panic it raises.
///
/// The panic is neither logged nor re-raised: logging it could route back
/// into a watched source. A hook installed after the first dispatch
/// replaces the quiet hook and gets to print callback panics again.
fn safe_call(callback: &Callback, record: &LogRecord) {
    Lazy::force(&QUIET_HOOK);
    let outer = IN_CALLBACK.with(|flag| flag.replace(true));
    let _ = catch_unwind(AssertUnwindSafe(|| callback.call(record)));
    IN_CALLBACK.with(|flag| flag.set(outer));
}
