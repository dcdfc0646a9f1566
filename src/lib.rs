//! thls - a tiny high-level-synthesis compiler.
//!
//! thls translates a restricted straight-line computation (assignments, integer `+ - *`,
//! persistent globals, a single return value) into a cycle-exact program for a single-issue
//! processor whose functional units retire after different latencies through one shared
//! register file write port.
//!
//! # Primary Usage
//!
//! ```
//! use thls::{compile, samples, Target};
//!
//! let target = Target::default();
//! let compiled = compile(&target, &samples::simple_test())?;
//!
//! let words = compiled.encode()?;
//! let image = compiled.data_image();
//! assert_eq!(words.len(), compiled.layout().program_words);
//! assert_eq!(image.len(), compiled.layout().data_words);
//! # Ok::<(), thls::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - instruction model, input tree, data table and IR builder
//! - [`schedule`] - list scheduler with integrated register allocation
//! - [`encoder`] - memory sizing and instruction word packing
//! - [`compiler`] - the [`compile`] driver and [`CompiledProgram`]
//! - [`core`] - shared infrastructure (errors, register file, target model)
//! - [`verify`] - static hazard checks on compiled programs

pub mod compiler;
pub mod core;
pub mod encoder;
pub mod ir;
pub mod samples;
pub mod schedule;
pub mod verify;

pub use crate::core::{CompileError, CompileResult, RegAllocError, RegId, RegisterFile, Target};
pub use compiler::{compile, CompiledProgram};
pub use encoder::{Encoder, MemoryLayout};
pub use ir::{Instruction, Opcode, Operand};
pub use schedule::{Exit, ExitMap, Schedule, Scheduler, SchedulerState};
pub use verify::{verify, VerifyError};
