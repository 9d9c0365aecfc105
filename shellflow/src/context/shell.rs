//! The root context.

use super::{RunContext, ShellConfig, SilencePolicy, TraceMode};
use crate::cancellation::CancellationToken;
use crate::errors::{Error, Result};
use crate::stages::BoxStage;
use crate::tracer::{DiscardTracer, ExecTracer, LoggingTracer, Tracer};
use crate::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

/// Root configuration shared by many independent runs.
///
/// A `Shell` is read-only once built. Each call to [`Shell::run`] copies it
/// into a fresh [`RunContext`], so concurrent runs never observe each
/// other's working directory, silent flag or tracer changes.
#[derive(Clone)]
pub struct Shell {
    workdir: PathBuf,
    silent: bool,
    silence_policy: SilencePolicy,
    tracer: Arc<dyn Tracer>,
    timeout: Option<Duration>,
}

impl Shell {
    /// Creates a shell rooted at the process working directory.
    ///
    /// Falls back to `.` if the working directory cannot be determined.
    #[must_use]
    pub fn new() -> Self {
        Self {
            workdir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            silent: false,
            silence_policy: SilencePolicy::default(),
            tracer: Arc::new(LoggingTracer),
            timeout: None,
        }
    }

    /// Builds a shell from configuration.
    pub fn from_config(config: &ShellConfig) -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::io("failed to read current directory", e))?;
        let workdir = match &config.workdir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd,
        };
        let tracer: Arc<dyn Tracer> = match config.trace {
            TraceMode::Off => Arc::new(DiscardTracer),
            TraceMode::Log => Arc::new(LoggingTracer),
            TraceMode::Print => Arc::new(ExecTracer::stderr().with_secrets(config.secrets.clone())),
        };
        Ok(Self {
            workdir,
            silent: config.silent,
            silence_policy: config.silence_policy,
            tracer,
            timeout: config.timeout(),
        })
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
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

    /// Sets the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Sets a deadline applied to every run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the working directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Returns the default silent flag.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        self.silent
    }

    /// Creates the private context of one run.
    #[must_use]
    pub fn context(&self, token: CancellationToken, stages: Vec<BoxStage>) -> RunContext {
        RunContext::new(
            self.workdir.clone(),
            self.silent,
            self.silence_policy,
            Arc::clone(&self.tracer),
            token,
            stages,
        )
    }

    /// Runs `stages` front to back and returns the final value.
    ///
    /// Zero stages is legal and yields [`Value::Nil`].
    pub async fn run<I>(&self, stages: I) -> Result<Value>
    where
        I: IntoIterator<Item = BoxStage>,
    {
        let token = self
            .timeout
            .map_or_else(CancellationToken::new, CancellationToken::with_timeout);
        self.run_with(token, stages).await
    }

    /// Runs `stages` under an explicit cancellation scope.
    pub async fn run_with<I>(&self, token: CancellationToken, stages: I) -> Result<Value>
    where
        I: IntoIterator<Item = BoxStage>,
    {
        let mut ctx = self.context(token, stages.into_iter().collect());
        let span = tracing::debug_span!("pipeline.run", run_id = %ctx.run_id(), stages = ctx.len());
        async move {
            let result = ctx.next(Value::Nil).await;
            match &result {
                Ok(value) => debug!(kind = value.kind(), "pipeline finished"),
                Err(e) => debug!(error = %e, "pipeline failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("workdir", &self.workdir)
            .field("silent", &self.silent)
            .field("silence_policy", &self.silence_policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
