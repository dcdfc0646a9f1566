// This module turns a finished schedule into what the execution substrate loads: one
// fixed-width word per cycle and the initial data memory. Once scheduling knows the highest
// register it touched, the data table is zero-extended to cover it and the register-index
// width becomes the number of bits needed to address that many slots. MemoryLayout records
// these sizes. Encoder packs each word from the least significant bit up: the opcode, then
// the first input (or the immediate when the instruction carries one), then the second input
// (the first input when an immediate is present), then the register written on that cycle
// according to the exit map, zero when nothing retires. The exit field belongs to the cycle,
// not to the instruction issued on it: the write port stores whatever unit result arrives.

//! Memory sizing and instruction word encoding.

use crate::core::{CompileError, CompileResult, RegId, Target};
use crate::ir::{DataTable, Instruction, Operand};
use crate::schedule::{ExitMap, Schedule};

/// Sizes the substrate's memories are configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Words in the program ROM, one per cycle.
    pub program_words: usize,
    /// Slots in the data memory: globals, constants and scratch registers.
    pub data_words: usize,
    /// Width of every register-index field.
    pub reg_bits: u32,
    pub opcode_bits: u32,
}

impl MemoryLayout {
    pub fn new(target: &Target, program_words: usize, data_words: usize) -> Self {
        Self {
            program_words,
            data_words,
            reg_bits: address_bits(data_words),
            opcode_bits: target.opcode_bits(),
        }
    }

    /// Total width of one instruction word.
    pub fn instruction_bits(&self) -> u32 {
        self.opcode_bits + 3 * self.reg_bits
    }
}

/// Bits needed to address `count` slots, i.e. ceil(log2(count)).
pub fn address_bits(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

/// Extend `data` with zeroed scratch slots up to the highest register `schedule` uses.
pub fn finalize_data(mut data: DataTable, schedule: &Schedule) -> DataTable {
    if let Some(max) = schedule.max_register() {
        data.pad_to(max as usize + 1);
    }
    data
}

/// Packs scheduled instructions into words for a fixed [`MemoryLayout`].
#[derive(Debug, Clone)]
pub struct Encoder {
    layout: MemoryLayout,
}

impl Encoder {
    pub fn new(layout: MemoryLayout) -> CompileResult<Self> {
        let bits = layout.instruction_bits();
        if bits > u64::BITS {
            return Err(CompileError::WordTooWide { bits });
        }
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Encode one instruction together with the register written on its cycle.
    pub fn encode_instruction(&self, isn: &Instruction, exit: RegId) -> CompileResult<u64> {
        let inputs = isn.inputs();
        let (r0, r1) = match isn.immediate() {
            Some(imm) => (u64::from(imm), operand_or_zero(inputs.first())?),
            None => (operand_or_zero(inputs.first())?, operand_or_zero(inputs.get(1))?),
        };

        let reg_bits = self.layout.reg_bits;
        let fields = [
            ("opcode", u64::from(isn.opcode().encoding()), self.layout.opcode_bits),
            ("r0", r0, reg_bits),
            ("r1", r1, reg_bits),
            ("exit", u64::from(exit), reg_bits),
        ];

        let mut word = 0u64;
        let mut shift = 0;
        for (field, value, bits) in fields {
            if bits < u64::BITS && value >> bits != 0 {
                return Err(CompileError::FieldOverflow { field, value, bits });
            }
            if value != 0 {
                word |= value << shift;
            }
            shift += bits;
        }
        Ok(word)
    }

    /// Encode a whole schedule, one word per cycle.
    pub fn encode(&self, instructions: &[Instruction], exits: &ExitMap) -> CompileResult<Vec<u64>> {
        instructions
            .iter()
            .enumerate()
            .map(|(cycle, isn)| {
                let exit = exits.register_at(cycle as u32).unwrap_or(0);
                self.encode_instruction(isn, exit)
            })
            .collect()
    }
}

fn operand_or_zero(operand: Option<&Operand>) -> CompileResult<u64> {
    match operand {
        None => Ok(0),
        Some(op) => op
            .as_physical()
            .map(u64::from)
            .ok_or(CompileError::UnresolvedOperand { operand: op.raw() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    fn encoder(data_words: usize) -> Encoder {
        Encoder::new(MemoryLayout::new(&Target::default(), 1, data_words)).unwrap()
    }

    #[test]
    fn test_address_bits() {
        assert_eq!(address_bits(0), 0);
        assert_eq!(address_bits(1), 0);
        assert_eq!(address_bits(2), 1);
        assert_eq!(address_bits(5), 3);
        assert_eq!(address_bits(8), 3);
        assert_eq!(address_bits(9), 4);
    }

    #[test]
    fn test_field_order() {
        let enc = encoder(5);
        assert_eq!(enc.layout().instruction_bits(), 12);

        let add = Instruction::new(
            Opcode::Add,
            None,
            vec![Operand::physical(0), Operand::physical(1)],
            None,
        );
        // exit=3 | r1=1 | r0=0 | opcode=1
        assert_eq!(enc.encode_instruction(&add, 3).unwrap(), (3 << 9) | (1 << 6) | 1);

        let mul = Instruction::new(
            Opcode::Mul,
            None,
            vec![Operand::physical(4), Operand::physical(2)],
            None,
        );
        assert_eq!(enc.encode_instruction(&mul, 0).unwrap(), (2 << 6) | (4 << 3) | 3);
        assert_eq!(enc.encode_instruction(&Instruction::nop(), 4).unwrap(), 4 << 9);
    }

    #[test]
    fn test_immediate_takes_first_field() {
        let enc = encoder(8);
        let copy = Instruction::new(Opcode::Copy, Some(6), vec![Operand::physical(5)], None);
        assert_eq!(enc.encode_instruction(&copy, 0).unwrap(), (5 << 6) | (6 << 3) | 4);

        let wide = Instruction::new(Opcode::Copy, Some(8), Vec::new(), None);
        assert_eq!(
            enc.encode_instruction(&wide, 0),
            Err(CompileError::FieldOverflow {
                field: "r0",
                value: 8,
                bits: 3
            })
        );
    }

    #[test]
    fn test_rejects_virtual_and_wide_words() {
        let enc = encoder(4);
        let out = Instruction::output_of(Operand::virtual_reg(2));
        assert_eq!(
            enc.encode_instruction(&out, 0),
            Err(CompileError::UnresolvedOperand { operand: -2 })
        );

        let layout = MemoryLayout::new(&Target::default(), 1, 1 << 22);
        assert_eq!(
            Encoder::new(layout).unwrap_err(),
            CompileError::WordTooWide { bits: 3 + 3 * 22 }
        );
    }
}
