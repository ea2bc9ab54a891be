use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

/// Asynchronous destination for captured [`LogRecord`]s.
///
/// Implementations transport records somewhere slow (a socket, a database,
/// a server-sent-events stream). The pump calls `send` from a background
/// task, never from the thread that emitted the log event.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Send a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted.
    /// - `Err(..)` on failure; the pump retries the whole batch with
    ///   backoff.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records. Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Batching parameters for [`spawn_pump`].
#[derive(Clone, Debug)]
pub struct PumpConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Spawn a Tokio task that drains `rx` into `sink`.
///
/// A batch is sent when it reaches `batch_size`, and pending records are
/// sent on every `flush_interval` tick regardless of how steadily records
/// keep arriving. When every sender is dropped the pending
/// batch is sent, the sink flushed, and the task ends.
///
/// Minimal thresholds are enforced for `batch_size` and `flush_interval`.
pub fn spawn_pump<S>(mut rx: mpsc::Receiver<LogRecord>, sink: S, config: PumpConfig) -> JoinHandle<()>
where
    S: RecordSink + 'static,
{
    let batch_size = config.batch_size.max(1);
    let flush_interval = config.flush_interval.max(Duration::from_millis(10));
    let backoff = config.initial_backoff;
    let max_backoff = config.max_backoff.max(backoff);

    tokio::spawn(async move {
        let mut batch = Vec::with_capacity(batch_size);
        // One ticker for the whole task: incoming records must not restart it.
        let mut ticker = interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= batch_size {
                            send_batch(&sink, &mut batch, backoff, max_backoff).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        send_batch(&sink, &mut batch, backoff, max_backoff).await;
                    }
                }
            }
        }

        if !batch.is_empty() {
            send_batch(&sink, &mut batch, backoff, max_backoff).await;
        }
        if let Err(e) = sink.flush().await {
            tracing::warn!(error = %e, "record sink flush failed");
        }
    })
}

/// Deliver `batch` in order, retrying from the failed record with
/// exponential backoff until everything is accepted.
async fn send_batch<S: RecordSink + ?Sized>(
    sink: &S,
    batch: &mut Vec<LogRecord>,
    mut backoff: Duration,
    max_backoff: Duration,
) {
    let mut sent = 0;
    loop {
        let mut failed = false;
        while sent < batch.len() {
            match sink.send(&batch[sent]).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(error = %e, retry_in = ?backoff, "record sink send failed");
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            batch.clear();
            return;
        }

        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, max_backoff);
    }
}
