//! Stages that inject or duplicate byte sources.

use super::{BoxStage, Stage};
use crate::context::RunContext;
use crate::errors::{Error, Result};
use crate::value::{BoxReader, Value};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

const COPY_CHUNK: usize = 8 * 1024;

struct EchoStage {
    text: String,
}

#[async_trait]
impl Stage for EchoStage {
    fn name(&self) -> &str {
        "echo"
    }

    async fn handle(&self, ctx: &mut RunContext, _input: Value) -> Result<Value> {
        ctx.tracer().trace("echo", std::slice::from_ref(&self.text));
        Ok(Value::Text(self.text.clone()))
    }
}

/// Ignores the incoming value and emits `text`.
pub fn echo(text: impl Into<String>) -> BoxStage {
    Box::new(EchoStage { text: text.into() })
}

struct InputStage {
    value: Mutex<Option<Value>>,
}

#[async_trait]
impl Stage for InputStage {
    fn name(&self) -> &str {
        "input"
    }

    async fn handle(&self, _ctx: &mut RunContext, _input: Value) -> Result<Value> {
        Ok(self.value.lock().take().unwrap_or_default())
    }
}

/// Ignores the incoming value and emits `value`.
///
/// The value is handed out once; a stage list is consumed by a single run.
pub fn input(value: impl Into<Value>) -> BoxStage {
    Box::new(InputStage {
        value: Mutex::new(Some(value.into())),
    })
}

struct ReaderStage {
    reader: Mutex<Option<BoxReader>>,
}

#[async_trait]
impl Stage for ReaderStage {
    fn name(&self) -> &str {
        "with_reader"
    }

    async fn handle(&self, ctx: &mut RunContext, _input: Value) -> Result<Value> {
        ctx.tracer().trace("with_reader", &["<reader>".to_string()]);
        self.reader
            .lock()
            .take()
            .map(Value::Reader)
            .ok_or_else(|| Error::Config("reader already consumed".to_string()))
    }
}

/// Ignores the incoming value and emits `reader` as a stream.
pub fn with_reader<R>(reader: R) -> BoxStage
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::new(ReaderStage {
        reader: Mutex::new(Some(Box::new(reader))),
    })
}

/// A destination for [`tee`].
#[derive(Clone)]
pub struct TeeSink {
    label: String,
    writer: Arc<Mutex<dyn Write + Send>>,
}

impl TeeSink {
    /// Wraps an owned writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            label: "<writer>".to_string(),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Wraps a writer the caller keeps a handle to, such as a shared buffer.
    pub fn shared<W: Write + Send + 'static>(writer: Arc<Mutex<W>>) -> Self {
        Self {
            label: "<shared>".to_string(),
            writer,
        }
    }

    /// The host's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout()).labelled("<stdout>")
    }

    /// The host's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr()).labelled("<stderr>")
    }

    /// Sets the label shown in traces.
    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn write_all(&self, chunk: &[u8]) -> std::io::Result<()> {
        self.writer.lock().write_all(chunk)
    }

    fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl std::fmt::Debug for TeeSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TeeSink").field(&self.label).finish()
    }
}

struct TeeStage {
    sinks: Vec<TeeSink>,
}

#[async_trait]
impl Stage for TeeStage {
    fn name(&self) -> &str {
        "tee"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let mut reader = input.into_reader()?;
        let labels: Vec<String> = self.sinks.iter().map(|s| s.label.clone()).collect();
        ctx.tracer().trace("tee", &labels);

        let mut copied = Vec::new();
        let mut chunk = vec![0u8; COPY_CHUNK];
        loop {
            let n = reader
                .read(&mut chunk)
                .await
                .map_err(|e| Error::io("failed to read tee input", e))?;
            if n == 0 {
                break;
            }
            for sink in &self.sinks {
                sink.write_all(&chunk[..n])
                    .map_err(|e| Error::io(format!("failed to write to {}", sink.label), e))?;
            }
            copied.extend_from_slice(&chunk[..n]);
        }
        for sink in &self.sinks {
            sink.flush()
                .map_err(|e| Error::io(format!("failed to flush {}", sink.label), e))?;
        }
        Ok(Value::Bytes(copied))
    }
}

/// Copies the input to every sink and forwards the same bytes.
pub fn tee<I>(sinks: I) -> BoxStage
where
    I: IntoIterator<Item = TeeSink>,
{
    Box::new(TeeStage {
        sinks: sinks.into_iter().collect(),
    })
}
