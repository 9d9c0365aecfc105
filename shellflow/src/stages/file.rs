//! Filesystem stages. Relative paths resolve against the run's working
//! directory at the moment the stage runs.

use super::{BoxStage, Stage};
use crate::context::RunContext;
use crate::errors::{missing_path, no_destination, Error, Result};
use crate::value::Value;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn display_args(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

struct CatStage {
    path: PathBuf,
}

#[async_trait]
impl Stage for CatStage {
    fn name(&self) -> &str {
        "cat"
    }

    async fn handle(&self, ctx: &mut RunContext, _input: Value) -> Result<Value> {
        let path = ctx.resolve(&self.path);
        ctx.tracer().trace("cat", &[path.display().to_string()]);
        let file = File::open(&path)
            .await
            .map_err(|e| Error::path_io("open", &path, e))?;
        Ok(Value::reader(file))
    }
}

/// Ignores the incoming value and emits the contents of `path` as a stream.
pub fn cat(path: impl Into<PathBuf>) -> BoxStage {
    Box::new(CatStage { path: path.into() })
}

struct OpenFileStage {
    path: PathBuf,
}

#[async_trait]
impl Stage for OpenFileStage {
    fn name(&self) -> &str {
        "open_file"
    }

    async fn handle(&self, ctx: &mut RunContext, _input: Value) -> Result<Value> {
        let path = ctx.resolve(&self.path);
        ctx.tracer().trace("open_file", &[path.display().to_string()]);
        let file = File::open(&path)
            .await
            .map_err(|e| Error::path_io("open", &path, e))?;

        // The handle is owned by the downstream value; buffering a stream that
        // is still open here releases it before this stage returns.
        ctx.next(Value::reader(file)).await?.materialize().await
    }
}

/// Opens `path` and runs the rest of the chain over it, closing the file
/// once the remainder has finished.
pub fn open_file(path: impl Into<PathBuf>) -> BoxStage {
    Box::new(OpenFileStage { path: path.into() })
}

#[derive(Clone, Copy)]
enum WriteMode {
    Truncate,
    Append,
}

struct WriteFileStage {
    paths: Vec<PathBuf>,
    mode: WriteMode,
}

impl WriteFileStage {
    fn new<I, P>(paths: I, mode: WriteMode) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(no_destination());
        }
        Ok(Self { paths, mode })
    }

    async fn open(&self, path: &Path) -> Result<File> {
        let mut options = OpenOptions::new();
        match self.mode {
            WriteMode::Truncate => options.write(true).create(true).truncate(true),
            WriteMode::Append => options.append(true).create(true),
        };
        options
            .open(path)
            .await
            .map_err(|e| Error::path_io("open", path, e))
    }
}

#[async_trait]
impl Stage for WriteFileStage {
    fn name(&self) -> &str {
        match self.mode {
            WriteMode::Truncate => "write_file",
            WriteMode::Append => "append_file",
        }
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let mut reader = input.into_reader()?;
        let paths: Vec<PathBuf> = self.paths.iter().map(|p| ctx.resolve(p)).collect();
        ctx.tracer().trace(self.name(), &display_args(&paths));

        // Every destination is opened before any byte is copied. Handles
        // already opened are dropped, and so closed, on any early return.
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            files.push(self.open(path).await?);
        }

        let mut written = Vec::new();
        reader
            .read_to_end(&mut written)
            .await
            .map_err(|e| Error::io("failed to read input", e))?;

        for (file, path) in files.iter_mut().zip(&paths) {
            file.write_all(&written)
                .await
                .map_err(|e| Error::path_io("write", path, e))?;
            file.flush()
                .await
                .map_err(|e| Error::path_io("flush", path, e))?;
        }
        Ok(Value::Bytes(written))
    }
}

/// Writes the input to every path, creating or truncating each file, and
/// forwards the bytes written.
///
/// Fails immediately when `paths` is empty.
pub fn write_file<I, P>(paths: I) -> Result<BoxStage>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    Ok(Box::new(WriteFileStage::new(paths, WriteMode::Truncate)?))
}

/// Appends the input to every path, creating missing files, and forwards the
/// bytes written.
///
/// Fails immediately when `paths` is empty.
pub fn append_file<I, P>(paths: I) -> Result<BoxStage>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    Ok(Box::new(WriteFileStage::new(paths, WriteMode::Append)?))
}

struct IfExistsStage {
    paths: Vec<PathBuf>,
}

#[async_trait]
impl Stage for IfExistsStage {
    fn name(&self) -> &str {
        "if_exists"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        for path in &self.paths {
            let path = ctx.resolve(path);
            if let Err(e) = tokio::fs::metadata(&path).await {
                return Err(missing_path(path, e));
            }
        }
        Ok(input)
    }
}

/// Fails unless every path exists; forwards the input untouched.
pub fn if_exists<I, P>(paths: I) -> BoxStage
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    Box::new(IfExistsStage {
        paths: paths.into_iter().map(Into::into).collect(),
    })
}
