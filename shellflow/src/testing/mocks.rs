//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::context::RunContext;
use crate::errors::{Error, Result};
use crate::stages::{BoxStage, Stage};
use crate::tracer::Tracer;
use crate::value::Value;

/// A recorded stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Position of the stage in the chain.
    pub index: usize,
    /// Shape of the value the stage received.
    pub input_kind: &'static str,
    /// Working directory at the time of the call.
    pub workdir: PathBuf,
    /// Silent flag at the time of the call.
    pub silent: bool,
}

/// A stage that records every call and passes its input through.
///
/// Clones share the recording, so a test keeps one handle and puts another
/// in the chain.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    name: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a boxed handle sharing this stage's recording.
    #[must_use]
    pub fn boxed(&self) -> BoxStage {
        Box::new(self.clone())
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        self.calls.lock().push(RecordedCall {
            index: ctx.cursor().saturating_sub(1),
            input_kind: input.kind(),
            workdir: ctx.workdir().to_path_buf(),
            silent: ctx.is_silent(),
        });
        Ok(input)
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }

    /// Boxes the stage.
    #[must_use]
    pub fn boxed(name: impl Into<String>, error: impl Into<String>) -> BoxStage {
        Box::new(Self::new(name, error))
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _ctx: &mut RunContext, _input: Value) -> Result<Value> {
        Err(Error::Custom(anyhow::anyhow!("{}", self.error)))
    }
}

/// A stage that panics with a fixed message.
#[derive(Debug)]
pub struct PanickingStage {
    message: String,
}

impl PanickingStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Boxes the stage.
    #[must_use]
    pub fn boxed(message: impl Into<String>) -> BoxStage {
        Box::new(Self::new(message))
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        "panic"
    }

    async fn handle(&self, _ctx: &mut RunContext, _input: Value) -> Result<Value> {
        panic!("{}", self.message)
    }
}

/// A stage that sleeps, then passes its input through.
///
/// The sleep is not raced with cancellation, so tests can observe that the
/// cursor refuses to enter the next stage once the run is cancelled.
#[derive(Debug)]
pub struct SlowStage {
    delay: Duration,
}

impl SlowStage {
    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> BoxStage {
        Box::new(Self {
            delay: Duration::from_millis(ms),
        })
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        "slow"
    }

    async fn handle(&self, _ctx: &mut RunContext, input: Value) -> Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(input)
    }
}

/// A tracer that keeps every traced command in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingTracer {
    entries: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl CollectingTracer {
    /// Creates an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every traced `(stage, args)` pair in order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Vec<String>)> {
        self.entries.lock().clone()
    }

    /// Returns the traced stage names in order.
    #[must_use]
    pub fn stages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(s, _)| s.clone()).collect()
    }
}

impl Tracer for CollectingTracer {
    fn trace(&self, stage: &str, args: &[String]) {
        self.entries.lock().push((stage.to_string(), args.to_vec()));
    }
}
