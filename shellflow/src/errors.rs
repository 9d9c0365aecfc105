//! Error types for the shellflow engine.
//!
//! Every failure surfaced by [`Shell::run`](crate::context::Shell::run) is an
//! [`Error`]. Stage failures are wrapped once with the position of the stage
//! that raised them, so a failed run always names the failing stage.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type for pipeline runs.
#[derive(Debug, Error)]
pub enum Error {
    /// A stage was configured in a way that can never run.
    #[error("configuration error: {0}")]
    Config(String),

    /// The incoming pipeline value has the wrong shape for the stage.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The shape the stage needed.
        expected: &'static str,
        /// The shape it received.
        found: &'static str,
    },

    /// A filesystem or stream operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What the stage was doing.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The child process could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// The program name.
        program: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The child process exited unsuccessfully.
    #[error("`{program}` exited with {status}")]
    ProcessExit {
        /// The program name.
        program: String,
        /// The exit status.
        status: ExitStatus,
    },

    /// Parsing or decoding structured text failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A path expression matched nothing.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// A line exceeded the scanner's limit.
    #[error("line {line} exceeds {limit} bytes")]
    LineTooLong {
        /// Zero-based index of the offending line.
        line: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A downstream stage panicked and a recover stage caught it.
    #[error("recovered from panic: {0}")]
    Panic(String),

    /// The run was cancelled or its deadline elapsed.
    #[error("pipeline cancelled: {0}")]
    Cancelled(String),

    /// An HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// A stage failed; wraps the stage's own error with its position.
    #[error("stage #{index} ({stage}) failed: {source}")]
    Stage {
        /// Zero-based position of the stage in the chain.
        index: usize,
        /// The stage name.
        stage: String,
        /// The stage's error.
        #[source]
        source: Box<Error>,
    },

    /// An error raised by a caller-supplied closure.
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl Error {
    /// Creates an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an I/O error for an operation on a path.
    pub fn path_io(action: &str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::io(format!("failed to {action} {}", path.display()), source)
    }

    /// Wraps the error with the position of the stage that raised it.
    ///
    /// Errors that already carry a position are returned unchanged, so a
    /// bracketing stage forwarding a downstream failure keeps the original
    /// position.
    #[must_use]
    pub fn at_stage(self, index: usize, stage: &str) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                index,
                stage: stage.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the position of the failing stage, if known.
    #[must_use]
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Self::Stage { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Returns the innermost error, skipping the stage wrapper.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled(_))
    }
}

/// Errors raised while turning bytes into structured values.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input is not valid for the format.
    #[error("invalid {format} input: {message}")]
    Syntax {
        /// Format name.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// The input parsed, but not into the requested shape.
    #[error("expected {expected} from {format} input, got {found}")]
    Shape {
        /// Format name.
        format: &'static str,
        /// Requested shape.
        expected: &'static str,
        /// Actual shape.
        found: &'static str,
    },

    /// The input is not UTF-8.
    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A CSV record could not be read.
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    /// The table header has a column that never ends.
    #[error("invalid table header")]
    InvalidTableHeader,

    /// The generic value does not fit the destination type.
    #[error("failed to decode into destination ({tag} tags): {source}")]
    Decode {
        /// Tag name the decoder was using.
        tag: String,
        /// The serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    /// Creates a syntax error.
    pub fn syntax(format: &'static str, message: impl ToString) -> Self {
        Self::Syntax {
            format,
            message: message.to_string(),
        }
    }

    /// Returns true if the failure happened while decoding rather than parsing.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Error produced by a file stage configured without any destination.
#[must_use]
pub fn no_destination() -> Error {
    Error::Config("no destination path specified".to_string())
}

/// Error produced when a path expected to exist is missing.
#[must_use]
pub fn missing_path(path: PathBuf, source: std::io::Error) -> Error {
    Error::path_io("stat", &path, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_stage_wraps_once() {
        let err = Error::Config("boom".to_string()).at_stage(2, "exec").at_stage(0, "recover");

        assert_eq!(err.stage_index(), Some(2));
        assert!(matches!(err.root(), Error::Config(_)));
        assert_eq!(err.to_string(), "stage #2 (exec) failed: configuration error: boom");
    }

    #[test]
    fn test_is_cancelled_looks_through_wrapper() {
        let err = Error::Cancelled("deadline".to_string()).at_stage(1, "exec");
        assert!(err.is_cancelled());
        assert!(!Error::Panic("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_parse_error_phase() {
        let decode = serde_json::from_str::<u8>("\"x\"").map_err(|source| ParseError::Decode {
            tag: "json".to_string(),
            source,
        });
        let Err(decode) = decode else {
            panic!("expected decode error");
        };
        assert!(decode.is_decode());
        assert!(!ParseError::InvalidTableHeader.is_decode());
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = Error::TypeMismatch {
            expected: "byte stream",
            found: "nil",
        };
        assert_eq!(err.to_string(), "type mismatch: expected byte stream, found nil");
    }
}
