//! Line-oriented and text-capturing stages.

use super::{BoxStage, Captured, Stage};
use crate::context::RunContext;
use crate::errors::{Error, Result};
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

/// Default limit on the length of a single line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

type LineFn = Arc<dyn Fn(usize, &str) -> String + Send + Sync>;

/// Rewrites every input line with a callback.
///
/// Lines are split on `\n` with a trailing `\r` removed, passed to the
/// callback with their zero-based index, and re-joined with `\n` after every
/// line. The output is [`Value::Bytes`].
#[derive(Clone)]
pub struct ForEachLineStage {
    func: LineFn,
    max_line_len: usize,
}

impl ForEachLineStage {
    /// Creates the stage.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(usize, &str) -> String + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Overrides the line length limit.
    #[must_use]
    pub fn max_line_len(mut self, limit: usize) -> Self {
        self.max_line_len = limit;
        self
    }

    /// Boxes the stage.
    #[must_use]
    pub fn into_stage(self) -> BoxStage {
        Box::new(self)
    }
}

impl std::fmt::Debug for ForEachLineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForEachLineStage")
            .field("max_line_len", &self.max_line_len)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ForEachLineStage {
    fn name(&self) -> &str {
        "for_each_line"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let mut reader = BufReader::new(input.into_reader()?);
        ctx.tracer().trace("for_each_line", &["<fn>".to_string()]);

        // Room for the longest accepted line plus its `\r\n`.
        let window = u64::try_from(self.max_line_len).unwrap_or(u64::MAX).saturating_add(2);
        let mut out = Vec::new();
        let mut raw = Vec::new();
        for index in 0.. {
            raw.clear();
            let n = (&mut reader)
                .take(window)
                .read_until(b'\n', &mut raw)
                .await
                .map_err(|e| Error::io("failed to scan input", e))?;
            if n == 0 {
                break;
            }
            let mut line = raw.as_slice();
            if let Some(rest) = line.strip_suffix(b"\n") {
                line = rest;
            }
            if let Some(rest) = line.strip_suffix(b"\r") {
                line = rest;
            }
            if line.len() > self.max_line_len {
                return Err(Error::LineTooLong {
                    line: index,
                    limit: self.max_line_len,
                });
            }

            let text = String::from_utf8_lossy(line);
            out.extend_from_slice((self.func)(index, &text).as_bytes());
            out.push(b'\n');
        }
        Ok(Value::Bytes(out))
    }
}

/// Rewrites every input line with `func(index, line)`.
pub fn for_each_line<F>(func: F) -> BoxStage
where
    F: Fn(usize, &str) -> String + Send + Sync + 'static,
{
    ForEachLineStage::new(func).into_stage()
}

struct ToTextStage;

#[async_trait]
impl Stage for ToTextStage {
    fn name(&self) -> &str {
        "to_text"
    }

    async fn handle(&self, _ctx: &mut RunContext, input: Value) -> Result<Value> {
        if input.is_nil() {
            return Ok(Value::Text(String::new()));
        }
        input.into_text().await.map(Value::Text)
    }
}

/// Coerces the value to [`Value::Text`]. Streams are drained, structured
/// values are rendered as JSON and nil becomes the empty string.
pub fn to_text() -> BoxStage {
    Box::new(ToTextStage)
}

struct OutputStage {
    slot: Captured<String>,
}

#[async_trait]
impl Stage for OutputStage {
    fn name(&self) -> &str {
        "output"
    }

    async fn handle(&self, _ctx: &mut RunContext, input: Value) -> Result<Value> {
        if input.is_nil() {
            return Err(Error::TypeMismatch {
                expected: "text",
                found: "nil",
            });
        }
        let forwarded = input.materialize().await?;
        let text = match &forwarded {
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Value::Text(text) => text.clone(),
            Value::Structured(value) => value.to_string(),
            Value::Nil | Value::Reader(_) => String::new(),
        };
        self.slot.set(text);
        Ok(forwarded)
    }
}

/// Copies the current value, as text, into `slot` and forwards it.
///
/// A stream is buffered first so the same bytes can still flow downstream.
pub fn output(slot: Captured<String>) -> BoxStage {
    Box::new(OutputStage { slot })
}
