//! Testing utilities for shellflow pipelines.
//!
//! This module provides:
//! - Mock stages that record, fail, panic or stall
//! - A tracer that collects traced commands in memory

mod mocks;

pub use mocks::{
    CollectingTracer, FailingStage, PanickingStage, RecordedCall, RecordingStage, SlowStage,
};
