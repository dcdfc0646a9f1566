// This module defines error types for the thls compiler using the thiserror crate for
// idiomatic Rust error handling. CompileError is the main error enum covering every way a
// compilation can stop: input trees that use constructs outside the straight-line vocabulary,
// names read before they are bound, a scheduler that stops making progress, a retirement
// cycle claimed twice, register file misuse, words or fields that do not fit the encoded
// instruction format, and target configurations whose widths or cycle counts are out of range.
// Each variant carries the context needed to report the failure (the construct, name, cycle or
// field involved). All errors are structural: there is no retry
// path, a failed compilation simply reports and stops. The module also provides
// CompileResult<T> as a convenience alias for Result<T, CompileError>.

//! Error types for the thls compiler.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

use super::register_file::RegAllocError;

/// Main error type for compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Unsupported construct: {construct}")]
    UnsupportedConstruct {
        construct: String,
    },

    #[error("Unknown name: {name}")]
    UnknownName {
        name: String,
    },

    /// Internal error: the IR handed to the scheduler can never become ready.
    #[error("Scheduler stalled for {stalls} consecutive cycles at cycle {cycle}")]
    StallExhaustion {
        cycle: u32,
        stalls: u32,
    },

    /// Internal error: two instructions tried to retire on the same cycle.
    #[error("No write port available at cycle {cycle}")]
    NoWritePort {
        cycle: u32,
    },

    #[error("Register allocation failed: {0}")]
    RegisterAllocation(#[from] RegAllocError),

    #[error("Value {value} does not fit in the {bits}-bit {field} field")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        bits: u32,
    },

    #[error("Virtual register v{} reached the encoder", .operand.unsigned_abs())]
    UnresolvedOperand {
        operand: i32,
    },

    #[error("Instruction word of {bits} bits exceeds 64 bits")]
    WordTooWide {
        bits: u32,
    },

    #[error("Data width of {bits} bits is outside 1..=64")]
    UnsupportedDataWidth {
        bits: u32,
    },

    #[error("{stages} multiplier stages overflow the latency counter")]
    LatencyOverflow {
        stages: u32,
    },

    #[error("Retirement cycle overflows after cycle {cycle}")]
    CycleOverflow {
        cycle: u32,
    },
}

impl CompileError {
    pub(crate) fn unsupported(construct: impl Into<String>) -> Self {
        CompileError::UnsupportedConstruct {
            construct: construct.into(),
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
