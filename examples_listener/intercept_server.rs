use std::sync::Arc;

use log_listener::init::{init_tracing_with_config, InitConfig};
use log_listener::sink::StderrSink;
use log_listener::{create_log_forwarder, log_listener, Callback, LogLevel, SourceRegistry};
use tracing::{error, info, warn};

/// Intercept the HTTP server's own log output and re-emit it under the
/// application's source with the application's formatting.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::clone(SourceRegistry::global());
    init_tracing_with_config(
        Arc::clone(&registry),
        InitConfig {
            enable_stdout: false,
            ..InitConfig::default()
        },
    )?;

    let app = registry.source("app.server");
    app.add_sink(StderrSink::new());
    app.set_propagate(false);

    let on_reload = Callback::new(|record| println!("[reload] {}", record.message));
    let on_error = Callback::new(|record| println!("[alert] {} failed at {}:{}", record.source, record.file, record.line));

    log_listener()
        .watch_all_http_server(true)
        .watch_all_file_watcher(true)
        .on_any(create_log_forwarder(Arc::clone(&registry), "app.server"))
        .on_keyword("reload", on_reload.clone(), false)?
        .on_level(LogLevel::Error, on_error)
        .start();

    info!(target: "hyper::server", "listening on 127.0.0.1:8000");
    warn!(target: "notify::watcher", "change detected in src/main.rs, reloading");
    error!(target: "hyper::server", "connection reset by peer");

    log_listener().off_keyword("reload", Some(&on_reload)).stop();

    // Back to the server's own (here: absent) output.
    info!(target: "hyper::server", "not captured anymore");
    Ok(())
}
