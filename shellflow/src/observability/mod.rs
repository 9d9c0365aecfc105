//! Logging setup for binaries and tests that use the engine.
//!
//! The engine itself only emits `tracing` events: a `pipeline.run` span per
//! run, a debug event per stage entered and process lifecycle events. These
//! helpers install a `tracing-subscriber` formatter to print them.

use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Builds the filter: `RUST_LOG` when set and valid, `default` otherwise.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs a global subscriber with the given format and default filter.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging_with(format: LogFormat, default_filter: &str) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(true);
    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.is_ok()
}

/// Installs a human-readable global subscriber.
pub fn init_logging(default_filter: &str) -> bool {
    init_logging_with(LogFormat::Pretty, default_filter)
}

/// Installs a JSON global subscriber.
pub fn init_json_logging(default_filter: &str) -> bool {
    init_logging_with(LogFormat::Json, default_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_rejected() {
        // Either call may lose to a subscriber installed by another test,
        // but the second can never win.
        init_logging("shellflow=debug");
        assert!(!init_json_logging("info"));
    }

    #[test]
    fn test_env_filter_falls_back_to_default() {
        let filter = env_filter("shellflow=trace");
        assert!(!filter.to_string().is_empty());
    }
}
