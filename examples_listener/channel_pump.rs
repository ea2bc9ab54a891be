use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use log_listener::pump::{spawn_pump, PumpConfig, RecordSink};
use log_listener::{channel_forwarder, here, LogLevel, LogListener, LogRecord, SourceRegistry};

/// Prints each record as a JSON line, the way a server-sent-events log
/// stream would frame it.
struct JsonLines;

#[async_trait]
impl RecordSink for JsonLines {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        println!("data: {}", serde_json::to_string(record)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let registry = Arc::new(SourceRegistry::new());
    let listener = LogListener::new(Arc::clone(&registry));

    let (forward, stats, rx) = channel_forwarder(256);
    let pump = spawn_pump(rx, JsonLines, PumpConfig::default());

    listener.watch("model.loader", false).on_any(forward).start();

    for i in 0..5 {
        registry.log("model.loader", LogLevel::Info, format!("loaded tensor block {}", i), here!());
    }

    // Dropping the callbacks closes the channel and lets the pump finish.
    listener.stop().clear_callbacks();
    if let Err(e) = pump.await {
        eprintln!("record pump task failed: {}", e);
    }

    println!("enqueued={} dropped={}", stats.enqueued(), stats.dropped());
}
