// This module serves as the central hub for the shared infrastructure of the thls compiler.
// It exports the pieces every pass depends on: the error taxonomy (CompileError and the
// CompileResult alias), the register file that allocates scratch slots above the reserved
// globals and constants, and the Target description of the execution substrate (data width,
// per-opcode latency, opcode field width). None of these know about the input tree or the
// scheduling algorithm, so they can be unit tested in isolation.

//! Core thls infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - `CompileError` covering front-end, scheduling and encoding failures
//!
//! ## Register Allocation (`register_file`)
//! - Lowest-free-first allocation with a permanently reserved prefix
//! - Growable bit set, so allocation never runs out
//!
//! ## Target Model (`target`)
//! - Data width and per-opcode latency of the execution substrate

pub mod error;
pub mod register_file;
pub mod target;

pub use error::{CompileError, CompileResult};

pub use register_file::{RegAllocError, RegBitSet, RegId, RegisterFile};

pub use target::{Target, MAX_DATA_WIDTH, OPCODE_BITS};
