/// Environment variable names used by this crate for convenient
/// configuration of [`crate::init::InitConfig`].
///
/// These are purely helpers; the listener itself never reads the
/// environment.

/// `EnvFilter` directives for the stdout layer, e.g. `info,hyper=warn`.
pub const LOG_LISTENER_FILTER_ENV: &str = "LOG_LISTENER_FILTER";

/// Whether to print events to stdout (`1`/`true` or `0`/`false`).
pub const LOG_LISTENER_STDOUT_ENV: &str = "LOG_LISTENER_STDOUT";

/// Whether to route `tracing` events into the source registry.
pub const LOG_LISTENER_CAPTURE_TRACING_ENV: &str = "LOG_LISTENER_CAPTURE_TRACING";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag; unset or unrecognized values yield `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => parse_flag(&v).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert!(env_flag("LOG_LISTENER_TEST_SURELY_UNSET", true));
        assert_eq!(env_or("LOG_LISTENER_TEST_SURELY_UNSET", "x"), "x");
    }
}
