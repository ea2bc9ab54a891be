pub mod level;
pub mod record;
pub mod sink;
pub mod source;
pub mod dispatch;
pub mod listener;
pub mod forward;
pub mod layer;
pub mod pump;

pub mod error;
pub mod env;
pub mod init;

pub use dispatch::Callback;
pub use error::{InitError, ListenerError};
pub use forward::{channel_forwarder, create_log_forwarder, tracing_forwarder};
pub use level::LogLevel;
pub use listener::{log_listener, LogListener};
pub use record::{Location, LogRecord};
pub use source::SourceRegistry;
