//! The datum flowing between stages.

use crate::errors::{Error, Result};
use std::fmt;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A boxed byte stream.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// A pipeline value.
///
/// Stages coerce the value into the shape they need with [`Value::into_reader`],
/// [`Value::into_bytes`] or [`Value::into_text`]; anything that cannot be
/// coerced is a [`Error::TypeMismatch`].
#[derive(Default)]
pub enum Value {
    /// No value. The first stage of every run receives this.
    #[default]
    Nil,
    /// A live byte stream, such as a child's standard output.
    Reader(BoxReader),
    /// An in-memory byte buffer.
    Bytes(Vec<u8>),
    /// An in-memory string.
    Text(String),
    /// A decoded structured value.
    Structured(serde_json::Value),
}

impl Value {
    /// Wraps any async reader.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Reader(Box::new(reader))
    }

    /// Returns the name of the value's shape, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Reader(_) => "byte stream",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Structured(_) => "structured value",
        }
    }

    /// Returns true for [`Value::Nil`].
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns true if the value is a live stream.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Reader(_))
    }

    /// Coerces the value into a byte stream.
    ///
    /// Structured values are rendered as JSON text.
    pub fn into_reader(self) -> Result<BoxReader> {
        match self {
            Self::Nil => Err(Error::TypeMismatch {
                expected: "byte stream",
                found: "nil",
            }),
            Self::Reader(reader) => Ok(reader),
            Self::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes))),
            Self::Text(text) => Ok(Box::new(Cursor::new(text.into_bytes()))),
            Self::Structured(value) => Ok(Box::new(Cursor::new(value.to_string().into_bytes()))),
        }
    }

    /// Drains the value into a byte buffer.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Text(text) => Ok(text.into_bytes()),
            other => {
                let mut reader = other.into_reader()?;
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| Error::io("failed to read input", e))?;
                Ok(buf)
            }
        }
    }

    /// Drains the value into a string.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => {
                let bytes = other.into_bytes().await?;
                Ok(match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
                })
            }
        }
    }

    /// Replaces a live stream with its buffered contents.
    ///
    /// Other shapes are returned unchanged.
    pub async fn materialize(self) -> Result<Self> {
        if self.is_stream() {
            Ok(Self::Bytes(self.into_bytes().await?))
        } else {
            Ok(self)
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Reader(_) => f.write_str("Reader(..)"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&String::from_utf8_lossy(b)).finish(),
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Structured(v) => f.debug_tuple("Structured").field(v).finish(),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}
