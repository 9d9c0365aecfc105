//! Serializable root configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// How a process stage decides whether its standard error is muted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilencePolicy {
    /// The silent flag is read once, when the process is spawned.
    #[default]
    SpawnTime,
    /// Standard error is forwarded by the engine and the flag is checked
    /// for every chunk, so a later `silent(true)` in the same run also mutes
    /// processes that are already running.
    Live,
}

/// Which tracer a [`Shell`](super::Shell) built from configuration uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    /// Discard traces.
    Off,
    /// Emit traces as `tracing` events.
    #[default]
    Log,
    /// Print `$ command` lines to standard error.
    Print,
}

/// Configuration for the root context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Working directory; relative paths resolve against the process cwd.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    /// Whether child standard error is muted by default.
    #[serde(default)]
    pub silent: bool,
    /// When the silent flag is consulted.
    #[serde(default)]
    pub silence_policy: SilencePolicy,
    /// Tracer selection.
    #[serde(default)]
    pub trace: TraceMode,
    /// Secret to placeholder mapping used by the printing tracer.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    /// Deadline applied to every run, in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
}

impl ShellConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Sets the default silent flag.
    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Sets the silence policy.
    #[must_use]
    pub fn with_silence_policy(mut self, policy: SilencePolicy) -> Self {
        self.silence_policy = policy;
        self
    }

    /// Sets the tracer selection.
    #[must_use]
    pub fn with_trace(mut self, trace: TraceMode) -> Self {
        self.trace = trace;
        self
    }

    /// Adds a secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>, placeholder: impl Into<String>) -> Self {
        self.secrets.insert(secret.into(), placeholder.into());
        self
    }

    /// Sets the per-run timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: ShellConfig = serde_json::from_str("{}").unwrap();
        assert!(config.workdir.is_none());
        assert!(!config.silent);
        assert_eq!(config.silence_policy, SilencePolicy::SpawnTime);
        assert_eq!(config.trace, TraceMode::Log);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_config_from_yaml() {
        let config: ShellConfig = serde_yaml::from_str(
            "workdir: /tmp\nsilent: true\nsilence_policy: live\ntrace: print\nsecrets:\n  s3cr3t: '***'\ntimeout_seconds: 2.5\n",
        )
        .unwrap();
        assert_eq!(config.workdir, Some(PathBuf::from("/tmp")));
        assert!(config.silent);
        assert_eq!(config.silence_policy, SilencePolicy::Live);
        assert_eq!(config.trace, TraceMode::Print);
        assert_eq!(config.secrets.get("s3cr3t").map(String::as_str), Some("***"));
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_non_positive_timeout_is_ignored() {
        assert!(ShellConfig::new().with_timeout(0.0).timeout().is_none());
        assert!(ShellConfig::new().with_timeout(-1.0).timeout().is_none());
    }
}
