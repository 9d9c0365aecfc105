//! Run configuration and per-run state.
//!
//! This module provides:
//! - [`ShellConfig`], a serializable description of the root configuration
//! - [`Shell`], the root context every run is copied from
//! - [`RunContext`], the private mutable state of one run, including the
//!   continuation cursor stages use to invoke the rest of the chain

mod config;
#[cfg(test)]
mod context_tests;
mod run;
mod shell;

pub use config::{ShellConfig, SilencePolicy, TraceMode};
pub use run::RunContext;
pub use shell::Shell;
