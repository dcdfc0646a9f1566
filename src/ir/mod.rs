//! Instruction model shared by every pass.
//!
//! An [`Instruction`] is an opcode, an optional immediate, up to two input operands and at
//! most one output. Operands are signed: non-negative values address the shared data memory
//! directly, negative values name single-assignment virtual registers that only exist until
//! scheduling rewrites them to physical slots.
//!
//! ```text
//! <add r0 r1 -> v2>      ; IR: reads constants, defines virtual v2
//! <mul r4 r2>            ; scheduled: virtual inputs resolved, write tracked by the exit map
//! ```

use std::fmt;

use crate::core::RegId;

pub mod ast;
pub mod builder;
pub mod data;

pub use builder::{IrBuilder, IrProgram};
pub use data::DataTable;

/// Operation selector, numbered as the substrate decodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Add = 1,
    Sub = 2,
    Mul = 3,
    Copy = 4,
    Input = 5,
    Output = 6,
}

impl Opcode {
    pub const ALL: [Opcode; 7] = [
        Opcode::Nop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Copy,
        Opcode::Input,
        Opcode::Output,
    ];

    /// Value placed in the opcode field of an encoded word.
    pub const fn encoding(self) -> u8 {
        self as u8
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Copy => "copy",
            Opcode::Input => "input",
            Opcode::Output => "output",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// Operand reference: a data memory slot or a virtual register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Operand(i32);

impl Operand {
    /// Reference to data memory slot `reg`.
    pub fn physical(reg: RegId) -> Self {
        Operand(reg as i32)
    }

    /// The `n`-th virtual register (`n >= 1`).
    pub fn virtual_reg(n: u32) -> Self {
        Operand(-(n as i32))
    }

    pub fn from_raw(raw: i32) -> Self {
        Operand(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_virtual(self) -> bool {
        self.0 < 0
    }

    /// Slot index when this operand is already concrete.
    pub fn as_physical(self) -> Option<RegId> {
        (self.0 >= 0).then_some(self.0 as RegId)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_virtual() {
            write!(f, "v{}", self.0.unsigned_abs())
        } else {
            write!(f, "r{}", self.0)
        }
    }
}

/// A single machine operation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    immediate: Option<u32>,
    inputs: Vec<Operand>,
    output: Option<Operand>,
}

impl Instruction {
    pub fn new(
        opcode: Opcode,
        immediate: Option<u32>,
        inputs: Vec<Operand>,
        output: Option<Operand>,
    ) -> Self {
        Self {
            opcode,
            immediate,
            inputs,
            output,
        }
    }

    pub fn nop() -> Self {
        Self::new(Opcode::Nop, None, Vec::new(), None)
    }

    /// Entry point of the external input value.
    pub fn input_to(output: Operand) -> Self {
        Self::new(Opcode::Input, None, Vec::new(), Some(output))
    }

    /// Sink for the returned value.
    pub fn output_of(value: Operand) -> Self {
        Self::new(Opcode::Output, None, vec![value], None)
    }

    pub fn binary(opcode: Opcode, lhs: Operand, rhs: Operand, output: Operand) -> Self {
        Self::new(opcode, None, vec![lhs, rhs], Some(output))
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn immediate(&self) -> Option<u32> {
        self.immediate
    }

    pub fn inputs(&self) -> &[Operand] {
        &self.inputs
    }

    pub fn output(&self) -> Option<Operand> {
        self.output
    }

    /// Copy of this instruction with new inputs and no output, as emitted into a schedule.
    pub fn rewritten(&self, inputs: Vec<Operand>) -> Self {
        Self::new(self.opcode, self.immediate, inputs, None)
    }

    pub fn is_nop(&self) -> bool {
        self.opcode == Opcode::Nop
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.opcode)?;
        if let Some(imm) = self.immediate {
            write!(f, " ({imm})")?;
        }
        for input in &self.inputs {
            write!(f, " {input}")?;
        }
        if let Some(output) = self.output {
            write!(f, " -> {output}")?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_kinds() {
        let v = Operand::virtual_reg(3);
        assert!(v.is_virtual());
        assert_eq!(v.raw(), -3);
        assert_eq!(v.as_physical(), None);

        let r = Operand::physical(7);
        assert!(!r.is_virtual());
        assert_eq!(r.as_physical(), Some(7));
        assert_eq!(Operand::from_raw(0).as_physical(), Some(0));
    }

    #[test]
    fn test_instruction_display() {
        let add = Instruction::binary(
            Opcode::Add,
            Operand::physical(0),
            Operand::physical(1),
            Operand::virtual_reg(2),
        );
        assert_eq!(add.to_string(), "<add r0 r1 -> v2>");
        assert_eq!(add.rewritten(vec![Operand::physical(0)]).to_string(), "<add r0>");
        assert_eq!(Instruction::nop().to_string(), "<nop>");

        let imm = Instruction::new(Opcode::Copy, Some(9), vec![Operand::physical(4)], None);
        assert_eq!(imm.to_string(), "<copy (9) r4>");
    }

    #[test]
    fn test_opcode_encoding_order() {
        let codes: Vec<u8> = Opcode::ALL.iter().map(|op| op.encoding()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6]);
    }
}
