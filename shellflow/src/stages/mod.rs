//! Stage trait and the built-in stage catalogue.
//!
//! A stage receives the run context and the current [`Value`] and returns
//! the next value. Stages that must bracket work around the rest of the
//! chain (process lifetime, open files, panic recovery) call
//! [`RunContext::next`] themselves and receive the downstream result.

mod control;
mod exec;
mod file;
#[cfg(feature = "http")]
mod http;
mod io;
mod json_path;
mod text;
mod unmarshal;

pub use control::{chdir, error_handler, recover, silent, tracer};
pub use exec::{exec, execs, pipe, ExecStage};
pub use file::{append_file, cat, if_exists, open_file, write_file};
#[cfg(feature = "http")]
pub use http::{http, HttpStage};
pub use io::{echo, input, tee, with_reader, TeeSink};
pub use json_path::{json_path, select_path};
pub use text::{for_each_line, output, to_text, ForEachLineStage, DEFAULT_MAX_LINE_LEN};
pub use unmarshal::{unmarshal, unmarshal_tagged};

use crate::context::RunContext;
use crate::errors::Result;
use crate::value::Value;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;

/// A unit of work in a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Returns the name of the stage, used in traces and errors.
    fn name(&self) -> &str;

    /// Handles the current value.
    ///
    /// Returning a value continues the chain with it. Calling
    /// [`RunContext::next`] instead runs the remainder first and returns its
    /// result.
    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value>;
}

/// An owned, type-erased stage.
pub type BoxStage = Box<dyn Stage>;

/// A stage backed by a synchronous closure.
pub struct FnStage<F>
where
    F: Fn(&mut RunContext, Value) -> Result<Value> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut RunContext, Value) -> Result<Value> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> std::fmt::Debug for FnStage<F>
where
    F: Fn(&mut RunContext, Value) -> Result<Value> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut RunContext, Value) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        (self.func)(ctx, input)
    }
}

/// A stage backed by a closure returning a boxed future.
///
/// The future borrows the context, so the closure can call
/// [`RunContext::next`] and bracket the rest of the chain.
pub struct AsyncFnStage<F>
where
    F: for<'a> Fn(&'a mut RunContext, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> std::fmt::Debug for AsyncFnStage<F>
where
    F: for<'a> Fn(&'a mut RunContext, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for AsyncFnStage<F>
where
    F: for<'a> Fn(&'a mut RunContext, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        (self.func)(ctx, input).await
    }
}

/// Boxes a synchronous closure as a stage.
pub fn stage_fn<F>(name: impl Into<String>, func: F) -> BoxStage
where
    F: Fn(&mut RunContext, Value) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(FnStage::new(name, func))
}

/// Boxes an async closure as a stage.
///
/// ```rust,ignore
/// let timed = async_stage("timed", |ctx, input| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         let out = ctx.next(input).await;
///         tracing::info!(elapsed = ?started.elapsed(), "downstream finished");
///         out
///     })
/// });
/// ```
pub fn async_stage<F>(name: impl Into<String>, func: F) -> BoxStage
where
    F: for<'a> Fn(&'a mut RunContext, Value) -> BoxFuture<'a, Result<Value>>
        + Send
        + Sync
        + 'static,
{
    Box::new(AsyncFnStage {
        name: name.into(),
        func,
    })
}

/// A shared slot a stage writes its result into.
///
/// Clones share the slot, so the caller keeps one handle and gives another to
/// the stage.
#[derive(Debug)]
pub struct Captured<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Captured<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Stores a value, replacing any previous one.
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Takes the value out of the slot.
    #[must_use]
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Returns true if a value has been stored.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T: Clone> Captured<T> {
    /// Returns a copy of the stored value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Captured<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Shell;

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("upper", |_ctx, input| match input {
            Value::Text(t) => Ok(Value::Text(t.to_uppercase())),
            other => Ok(other),
        });
        assert_eq!(stage.name(), "upper");

        let out = Shell::new()
            .run([echo("shout"), Box::new(stage) as BoxStage])
            .await
            .unwrap();
        assert!(matches!(out, Value::Text(ref t) if t == "SHOUT"));
    }

    #[tokio::test]
    async fn test_async_stage_brackets_downstream() {
        let seen = Captured::<String>::new();
        let probe = seen.clone();
        let bracket = async_stage("bracket", move |ctx, input| {
            let probe = probe.clone();
            Box::pin(async move {
                let out = ctx.next(input).await?;
                probe.set(format!("after:{}", out.kind()));
                Ok(out)
            })
        });

        Shell::new()
            .run([bracket, echo("x")])
            .await
            .unwrap();
        assert_eq!(seen.get(), Some("after:text".to_string()));
    }

    #[test]
    fn test_captured_shares_slot() {
        let a = Captured::new();
        let b = a.clone();
        b.set(7);
        assert!(a.is_set());
        assert_eq!(a.get(), Some(7));
        assert_eq!(a.take(), Some(7));
        assert!(!b.is_set());
    }
}
