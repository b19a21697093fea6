//! Error types
//!
//! None of these escape `DatamoshEffect::process_frame`: a failed frame is
//! reported as `FrameOutcome::Degraded` and rendered as a passthrough.

use thiserror::Error;

use crate::buffer::BufferDesc;
use crate::kernel::KernelPass;

/// Temporary buffer allocation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("zero-sized buffer requested ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },

    #[error("texture budget exceeded: {requested} bytes requested, {available} available")]
    BudgetExceeded { requested: u64, available: u64 },

    #[error("out of memory allocating {0}")]
    OutOfMemory(BufferDesc),
}

/// Corruption kernel failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("corruption kernel unavailable: {0}")]
    Unavailable(String),

    #[error("{pass} pass expects {expected} input(s), got {got}")]
    MissingInput {
        pass: KernelPass,
        expected: usize,
        got: usize,
    },

    #[error("{pass} pass failed: {reason}")]
    PassFailed { pass: KernelPass, reason: String },
}

/// A frame that could not be moshed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("buffer rotation requested while controller is cold")]
    NotWarm,
}

/// Effect configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse effect config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read effect config: {0}")]
    Io(#[from] std::io::Error),
}
