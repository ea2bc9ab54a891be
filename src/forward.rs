//! Ready-made callbacks that redirect captured records elsewhere.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::dispatch::Callback;
use crate::level::LogLevel;
use crate::record::LogRecord;
use crate::source::SourceRegistry;

/// Target used for records re-emitted through `tracing`.
pub const FORWARD_TARGET: &str = "log_listener::forward";

/// Re-emit every record into the source called `target` of `registry`,
/// keeping its level, message, origin and extra fields.
///
/// Typically used with an intercepted third-party source so its output
/// shows up under the application's own source and formatting. `target`
/// must not itself be watched by the listener the callback is registered
/// on.
pub fn create_log_forwarder(registry: Arc<SourceRegistry>, target: &str) -> Callback {
    let target = target.to_string();
    Callback::new(move |record: &LogRecord| {
        registry.emit(
            &target,
            record.level,
            record.message.clone(),
            record.location(),
            record.extra.clone(),
        );
    })
}

/// Re-emit every record as a `tracing` event at the matching level.
///
/// The original source name is attached as the `source` field.
pub fn tracing_forwarder() -> Callback {
    Callback::new(|record: &LogRecord| {
        let source = record.source.as_str();
        let message = record.message.as_str();
        match LogLevel::from_value(record.level).unwrap_or(LogLevel::Info) {
            LogLevel::Debug => tracing::debug!(target: FORWARD_TARGET, source, "{}", message),
            LogLevel::Info => tracing::info!(target: FORWARD_TARGET, source, "{}", message),
            LogLevel::Warning => tracing::warn!(target: FORWARD_TARGET, source, "{}", message),
            LogLevel::Error | LogLevel::Critical => {
                tracing::error!(target: FORWARD_TARGET, source, "{}", message)
            }
        }
    })
}

/// Counters shared with a [`channel_forwarder`] callback.
#[derive(Debug, Clone, Default)]
pub struct ForwardStats {
    /// Records handed to the channel.
    pub enqueued: Arc<AtomicU64>,
    /// Records dropped because the channel was full or closed.
    pub dropped: Arc<AtomicU64>,
}

impl ForwardStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Hand captured records to async consumers over a bounded channel.
///
/// The callback never blocks the logging thread: when the channel is full
/// the record is dropped and counted.
pub fn channel_forwarder(buffer: usize) -> (Callback, ForwardStats, mpsc::Receiver<LogRecord>) {
    let (tx, rx) = mpsc::channel::<LogRecord>(buffer.max(1));
    let stats = ForwardStats::default();
    let counters = stats.clone();

    let callback = Callback::new(move |record: &LogRecord| {
        match tx.try_send(record.clone()) {
            Ok(()) => {
                counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    (callback, stats, rx)
}
