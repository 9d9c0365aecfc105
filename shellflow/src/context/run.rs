//! Per-run mutable state and the continuation cursor.

use super::SilencePolicy;
use crate::cancellation::CancellationToken;
use crate::errors::{Error, Result};
use crate::stages::BoxStage;
use crate::tracer::Tracer;
use crate::value::Value;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// The private state of one pipeline run.
///
/// A `RunContext` is created by [`Shell::run`](super::Shell::run) from the
/// root configuration and is never shared between runs, so stages may mutate
/// the working directory, silent flag and tracer freely.
pub struct RunContext {
    run_id: Uuid,
    workdir: PathBuf,
    silent: Arc<AtomicBool>,
    silence_policy: SilencePolicy,
    tracer: Arc<dyn Tracer>,
    token: CancellationToken,
    stages: Arc<[BoxStage]>,
    cursor: usize,
}

impl RunContext {
    pub(crate) fn new(
        workdir: PathBuf,
        silent: bool,
        silence_policy: SilencePolicy,
        tracer: Arc<dyn Tracer>,
        token: CancellationToken,
        stages: Vec<BoxStage>,
    ) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            workdir,
            silent: Arc::new(AtomicBool::new(silent)),
            silence_policy,
            tracer,
            token,
            stages: stages.into(),
            cursor: 0,
        }
    }

    /// Returns the identifier of this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the working directory.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Sets the working directory; a relative path is resolved against the
    /// current one.
    pub fn set_workdir(&mut self, path: impl AsRef<Path>) {
        self.workdir = self.resolve(path);
    }

    /// Resolves `path` against the working directory.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    /// Returns whether child standard error is muted.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::SeqCst)
    }

    /// Sets the silent flag for the rest of the run.
    pub fn set_silent(&mut self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    pub(crate) fn silent_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.silent)
    }

    /// Returns the silence policy.
    #[must_use]
    pub const fn silence_policy(&self) -> SilencePolicy {
        self.silence_policy
    }

    /// Returns the tracer.
    #[must_use]
    pub fn tracer(&self) -> &dyn Tracer {
        self.tracer.as_ref()
    }

    /// Replaces the tracer for the rest of the run.
    pub fn set_tracer(&mut self, tracer: Arc<dyn Tracer>) {
        self.tracer = tracer;
    }

    /// Returns the cancellation token of the run.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the number of stages entered so far.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the number of stages in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if stages remain after the cursor.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.cursor < self.stages.len()
    }

    /// Runs every remaining stage and returns the downstream result.
    ///
    /// Stages call this to bracket work around the rest of the chain. When
    /// nothing remains, `input` is returned unchanged. A failing stage stops
    /// the chain and its error is wrapped with the stage position.
    pub fn next(&mut self, input: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let stages = Arc::clone(&self.stages);
            let mut value = input;
            while self.cursor < stages.len() {
                let index = self.cursor;
                let stage = &stages[index];
                self.cursor += 1;

                if self.token.is_cancelled() {
                    let reason = self.token.reason().unwrap_or_default();
                    return Err(Error::Cancelled(reason).at_stage(index, stage.name()));
                }

                debug!(run_id = %self.run_id, index, stage = stage.name(), "entering stage");
                value = stage
                    .handle(self, value)
                    .await
                    .map_err(|e| e.at_stage(index, stage.name()))?;
            }
            Ok(value)
        })
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("workdir", &self.workdir)
            .field("silent", &self.is_silent())
            .field("silence_policy", &self.silence_policy)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
