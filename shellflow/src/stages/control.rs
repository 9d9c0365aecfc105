//! Stages that change the run context or bracket the rest of the chain.

use super::{BoxStage, Stage};
use crate::context::RunContext;
use crate::errors::{missing_path, Error, Result};
use crate::tracer::Tracer;
use crate::value::Value;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

struct ChdirStage {
    path: PathBuf,
}

#[async_trait]
impl Stage for ChdirStage {
    fn name(&self) -> &str {
        "chdir"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let target = ctx.resolve(&self.path);
        ctx.tracer().trace("cd", &[target.display().to_string()]);
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                ctx.set_workdir(target);
                Ok(input)
            }
            Ok(_) => Err(Error::Config(format!(
                "{} is not a directory",
                target.display()
            ))),
            Err(e) => Err(missing_path(target, e)),
        }
    }
}

/// Changes the working directory for the rest of the run.
///
/// The target must exist; otherwise the working directory is left unchanged.
pub fn chdir(path: impl Into<PathBuf>) -> BoxStage {
    Box::new(ChdirStage { path: path.into() })
}

struct SilentStage(bool);

#[async_trait]
impl Stage for SilentStage {
    fn name(&self) -> &str {
        "silent"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        ctx.set_silent(self.0);
        Ok(input)
    }
}

/// Sets the silent flag for the rest of the run.
pub fn silent(flag: bool) -> BoxStage {
    Box::new(SilentStage(flag))
}

struct TracerStage {
    tracer: Arc<dyn Tracer>,
}

#[async_trait]
impl Stage for TracerStage {
    fn name(&self) -> &str {
        "tracer"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        ctx.set_tracer(Arc::clone(&self.tracer));
        Ok(input)
    }
}

/// Replaces the tracer for the rest of the run.
pub fn tracer(tracer: impl Tracer + 'static) -> BoxStage {
    Box::new(TracerStage {
        tracer: Arc::new(tracer),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct RecoverStage;

#[async_trait]
impl Stage for RecoverStage {
    fn name(&self) -> &str {
        "recover"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        match AssertUnwindSafe(ctx.next(input)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(panic = %message, "recovered from panic");
                Err(Error::Panic(message))
            }
        }
    }
}

/// Runs the rest of the chain and turns a panic into [`Error::Panic`].
///
/// Install it at the front of a chain; panics raised before it are not
/// caught.
pub fn recover() -> BoxStage {
    Box::new(RecoverStage)
}

struct ErrorHandlerStage;

#[async_trait]
impl Stage for ErrorHandlerStage {
    fn name(&self) -> &str {
        "error_handler"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let result = ctx.next(input).await;
        if let Err(e) = &result {
            tracing::error!(run_id = %ctx.run_id(), error = %e, "pipeline failed");
        }
        result
    }
}

/// Logs any downstream error and returns it unchanged.
pub fn error_handler() -> BoxStage {
    Box::new(ErrorHandlerStage)
}
