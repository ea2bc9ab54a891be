use crate::env::{env_flag, env_or, LOG_LISTENER_CAPTURE_TRACING_ENV, LOG_LISTENER_FILTER_ENV, LOG_LISTENER_STDOUT_ENV};
use crate::error::InitError;
use crate::layer::SourceLayer;
use crate::source::SourceRegistry;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Configuration of the global `tracing` subscriber.
///
/// **Fields**
/// - `filter`: `EnvFilter` directives applied to the stdout layer only.
///   The source layer always sees every event; sources apply their own
///   levels.
/// - `enable_stdout`: add a `tracing_subscriber::fmt` layer.
/// - `capture_tracing`: add a [`SourceLayer`] so `tracing` events become
///   emissions on named sources the listener can watch.
#[derive(Clone, Debug)]
pub struct InitConfig {
    pub filter: String,
    pub enable_stdout: bool,
    pub capture_tracing: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            enable_stdout: true,
            capture_tracing: true,
        }
    }
}

impl InitConfig {
    /// Defaults overridden by the `LOG_LISTENER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            filter: env_or(LOG_LISTENER_FILTER_ENV, &defaults.filter),
            enable_stdout: env_flag(LOG_LISTENER_STDOUT_ENV, defaults.enable_stdout),
            capture_tracing: env_flag(LOG_LISTENER_CAPTURE_TRACING_ENV, defaults.capture_tracing),
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// **Parameters**
/// - `registry`: registry that receives `tracing` events when
///   `capture_tracing` is set.
/// - `config`: [`InitConfig`] selecting the layers.
///
/// **Returns**
/// - `Err(InitError::InvalidFilter)` for malformed filter directives.
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber exists.
pub fn init_tracing_with_config(registry: Arc<SourceRegistry>, config: InitConfig) -> Result<(), InitError> {
    let source_layer = config
        .capture_tracing
        .then(|| SourceLayer::new(registry));
    let fmt_layer = if config.enable_stdout {
        let filter = EnvFilter::try_new(&config.filter)?;
        Some(tracing_subscriber::fmt::layer().with_filter(filter))
    } else {
        None
    };

    // `Option<L>` is itself a layer, so both variants share one type.
    let subscriber = Registry::default().with(source_layer).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize tracing with [`InitConfig::from_env`] on the global registry.
///
/// This is the recommended entrypoint for applications.
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with_config(Arc::clone(SourceRegistry::global()), InitConfig::from_env())
}
