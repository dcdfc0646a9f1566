//! Target processor description.
//!
//! The execution substrate is a single-issue machine: one instruction is fetched per cycle,
//! its two operands are read from the shared data memory on issue, and the functional unit
//! writes its result back through the single write port `latency` cycles later.

use super::{CompileError, CompileResult};
use crate::ir::Opcode;

/// Fixed opcode field width for the seven-opcode vocabulary.
pub const OPCODE_BITS: u32 = 3;

/// Widest data word the encoder can produce an image for.
pub const MAX_DATA_WIDTH: u32 = u64::BITS;

/// Immutable parameters of the execution substrate.
///
/// Latencies always fit a `u32` with room for one more cycle, so `max_latency() + 1` cannot
/// overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Bits per data memory word.
    data_width: u32,
    /// Pipeline registers inside the multiplier.
    multiplier_stages: u32,
}

impl Target {
    pub fn new(data_width: u32, multiplier_stages: u32) -> CompileResult<Self> {
        if !(1..=MAX_DATA_WIDTH).contains(&data_width) {
            return Err(CompileError::UnsupportedDataWidth { bits: data_width });
        }
        // Multiply latency is `1 + stages`, and the stall bound adds one more.
        if multiplier_stages.checked_add(2).is_none() {
            return Err(CompileError::LatencyOverflow {
                stages: multiplier_stages,
            });
        }
        Ok(Self {
            data_width,
            multiplier_stages,
        })
    }

    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    pub fn multiplier_stages(&self) -> u32 {
        self.multiplier_stages
    }

    pub fn opcode_bits(&self) -> u32 {
        OPCODE_BITS
    }

    /// Cycles between issue and the result being readable.
    ///
    /// Returns `None` for opcodes that never write the register file.
    pub fn latency(&self, opcode: Opcode) -> Option<u32> {
        match opcode {
            Opcode::Nop | Opcode::Output => None,
            Opcode::Input | Opcode::Copy => Some(1),
            Opcode::Add | Opcode::Sub => Some(2),
            Opcode::Mul => Some(1 + self.multiplier_stages),
        }
    }

    /// Longest latency of any writing opcode.
    pub fn max_latency(&self) -> u32 {
        Opcode::ALL
            .iter()
            .filter_map(|&op| self.latency(op))
            .max()
            .unwrap_or(0)
    }

    /// Per-opcode latency contract the substrate has to honour.
    pub fn latency_table(&self) -> Vec<(Opcode, Option<u32>)> {
        Opcode::ALL.iter().map(|&op| (op, self.latency(op))).collect()
    }

    /// Mask selecting the low `data_width` bits of a value.
    pub fn data_mask(&self) -> u64 {
        if self.data_width >= MAX_DATA_WIDTH {
            u64::MAX
        } else {
            (1u64 << self.data_width) - 1
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self {
            data_width: 32,
            multiplier_stages: 2,
        }
    }
}
