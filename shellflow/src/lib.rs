//! # Shellflow
//!
//! Composable process pipelines with typed decoding of their output.
//!
//! A pipeline is an ordered list of stages run against a private
//! [`RunContext`](context::RunContext) copied from a shared root
//! [`Shell`](context::Shell). Shellflow provides:
//!
//! - **Process stages**: spawn programs, stream their output into the rest
//!   of the chain and fail fast on non-zero exits
//! - **Explicit continuation**: a stage may call `ctx.next(value)` to run the
//!   remainder of the chain and bracket it with its own work
//! - **Decoding**: parse CSV, JSON, YAML, dotenv, token streams and
//!   whitespace-aligned tables, then decode them into typed structs
//! - **Tracing**: shell-style command echo with secret redaction
//! - **Cancellation**: per-run tokens and deadlines that kill child processes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shellflow::prelude::*;
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct Pod {
//!     name: String,
//!     status: String,
//! }
//!
//! let pods = Captured::<Vec<Pod>>::new();
//! Shell::new()
//!     .run([
//!         exec("kubectl", ["get", "pods"]),
//!         unmarshal(TableParser::new(), pods.clone()),
//!     ])
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod errors;
pub mod observability;
pub mod parser;
pub mod stages;
pub mod testing;
pub mod tracer;
pub mod value;

pub use errors::{Error, ParseError, Result};
pub use value::Value;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{RunContext, Shell, ShellConfig, SilencePolicy, TraceMode};
    pub use crate::errors::{Error, ParseError, Result};
    pub use crate::parser::{
        CsvParser, DotenvParser, FieldTags, JsonParser, Parser, ParserExt, TableParser,
        TokenParser, YamlParser,
    };
    #[cfg(feature = "http")]
    pub use crate::stages::http;
    pub use crate::stages::{
        append_file, async_stage, cat, chdir, echo, error_handler, exec, execs, for_each_line,
        if_exists, input, json_path, open_file, output, pipe, recover, silent, stage_fn, tee,
        to_text, tracer, unmarshal, unmarshal_tagged, with_reader, write_file, BoxStage,
        Captured, Stage,
    };
    pub use crate::tracer::{DiscardTracer, ExecTracer, LoggingTracer, Tracer};
    pub use crate::value::Value;
}
