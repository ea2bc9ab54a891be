/// Errors raised by [`crate::listener::LogListener`] registration calls.
///
/// Only programming misuse is reported; "not found" conditions are no-ops.
#[derive(thiserror::Error, Debug)]
pub enum ListenerError {
    #[error("keyword {keyword:?} is not a valid regular expression")]
    InvalidKeyword {
        keyword: String,
        #[source]
        source: regex::Error,
    },
}

/// Error type returned when installing the global `tracing` subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),
}
