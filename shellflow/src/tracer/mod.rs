//! Command tracing for human-readable run logs.
//!
//! Stages report what they are about to do through a [`Tracer`]. The tracer
//! is part of the run context, so a `tracer` stage can swap it mid-run.

mod exec;

pub use exec::ExecTracer;

/// Receives a description of each traced stage.
#[cfg_attr(test, mockall::automock)]
pub trait Tracer: Send + Sync {
    /// Records that `stage` is running with `args`.
    fn trace(&self, stage: &str, args: &[String]);
}

/// A tracer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardTracer;

impl Tracer for DiscardTracer {
    fn trace(&self, _stage: &str, _args: &[String]) {}
}

/// A tracer that emits each command as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTracer;

impl Tracer for LoggingTracer {
    fn trace(&self, stage: &str, args: &[String]) {
        tracing::info!(stage, ?args, "$ {}", ExecTracer::render_plain(stage, args));
    }
}
