// This module checks a compiled program against the timing contract of the substrate without
// running it. The checks use the per-cycle instructions, the per-cycle register writes, the
// size of the data memory and the IR instruction issued on each cycle. Every instruction whose
// opcode writes the register file must have its own value in the exit map exactly `latency`
// cycles after issue, and every write must have such an issuing instruction; writes must land inside the
// program and never target a preloaded global or constant slot; and every register index must
// exist in the data memory. Reads are checked against the IR instruction behind each cycle: the
// most recent write to a register before a read of a virtual register must be the write of that
// very value, so a register recycled while its value is still pending a read is caught.

//! Static verification of scheduled programs.

use thiserror::Error;

use crate::compiler::CompiledProgram;
use crate::core::RegId;
use crate::ir::{Instruction, Operand};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("cycle {cycle} reads r{reg} before any write to it")]
    ReadBeforeWrite { cycle: u32, reg: RegId },

    #[error("cycle {cycle} reads r{reg} expecting {expected}, but it last received {found}")]
    StaleRead {
        cycle: u32,
        reg: RegId,
        expected: Operand,
        found: Operand,
    },

    #[error("write at cycle {cycle} stores {found}, expected {expected} issued at cycle {issue}")]
    MisroutedWrite {
        issue: u32,
        cycle: u32,
        expected: Operand,
        found: Operand,
    },

    #[error("cycle {cycle} issues an instruction with no IR source")]
    UntracedIssue { cycle: u32 },

    #[error("cycle {cycle} overwrites preloaded slot r{reg}")]
    ReservedWrite { cycle: u32, reg: RegId },

    #[error("write at cycle {cycle} falls past the end of the program")]
    WriteOutsideProgram { cycle: u32 },

    #[error("instruction issued at cycle {issue} has no write at cycle {cycle}")]
    MissingWrite { issue: u32, cycle: u32 },

    #[error("write at cycle {cycle} has no issuing instruction")]
    OrphanWrite { cycle: u32 },

    #[error("cycle {cycle} reads unresolved operand {operand}")]
    UnresolvedRead { cycle: u32, operand: i32 },

    #[error("register r{reg} lies outside the {size}-slot data memory")]
    UnsizedRegister { reg: RegId, size: usize },
}

/// Check `compiled` for read-after-write hazards and write-port misuse.
pub fn verify(compiled: &CompiledProgram) -> Result<(), VerifyError> {
    let target = compiled.target();
    let exits = compiled.exits();
    let length = compiled.program().len() as u32;
    let size = compiled.register_count();
    let sized = |reg: RegId| {
        if (reg as usize) < size {
            Ok(())
        } else {
            Err(VerifyError::UnsizedRegister { reg, size })
        }
    };

    let mut expected = vec![false; length as usize];
    for (issue, isn) in compiled.program().iter().enumerate() {
        let issue = issue as u32;
        let Some(latency) = target.latency(isn.opcode()) else {
            continue;
        };
        let cycle = issue.saturating_add(latency);
        let Some(exit) = exits.get(cycle) else {
            return Err(VerifyError::MissingWrite { issue, cycle });
        };
        if let Some(vreg) = source(compiled, issue)?.output() {
            if exit.vreg != vreg {
                return Err(VerifyError::MisroutedWrite {
                    issue,
                    cycle,
                    expected: vreg,
                    found: exit.vreg,
                });
            }
        }
        if let Some(slot) = expected.get_mut(cycle as usize) {
            *slot = true;
        }
    }

    for (cycle, exit) in exits.iter() {
        if cycle >= length {
            return Err(VerifyError::WriteOutsideProgram { cycle });
        }
        if !expected[cycle as usize] {
            return Err(VerifyError::OrphanWrite { cycle });
        }
        if exit.reg < compiled.preloaded() {
            return Err(VerifyError::ReservedWrite { cycle, reg: exit.reg });
        }
        sized(exit.reg)?;
    }

    for (cycle, isn) in compiled.program().iter().enumerate() {
        let cycle = cycle as u32;
        if isn.is_nop() {
            continue;
        }
        let origin = source(compiled, cycle)?;
        for (&input, &wanted) in isn.inputs().iter().zip(origin.inputs()) {
            let reg = input.as_physical().ok_or(VerifyError::UnresolvedRead {
                cycle,
                operand: input.raw(),
            })?;
            sized(reg)?;

            let last = exits
                .iter()
                .take_while(|&(c, _)| c < cycle)
                .filter(|(_, exit)| exit.reg == reg)
                .last();
            match last {
                Some((_, exit)) if wanted.is_virtual() && exit.vreg != wanted => {
                    return Err(VerifyError::StaleRead {
                        cycle,
                        reg,
                        expected: wanted,
                        found: exit.vreg,
                    });
                }
                None if wanted.is_virtual() || reg >= compiled.preloaded() => {
                    return Err(VerifyError::ReadBeforeWrite { cycle, reg });
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn source(compiled: &CompiledProgram, cycle: u32) -> Result<&Instruction, VerifyError> {
    compiled
        .sources()
        .get(cycle as usize)
        .and_then(Option::as_ref)
        .ok_or(VerifyError::UntracedIssue { cycle })
}
