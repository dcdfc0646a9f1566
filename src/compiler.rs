//! Compilation driver.
//!
//! [`compile`] runs the three passes back to back, each consuming the previous one's output:
//! IR building, scheduling, and data finalization. The resulting [`CompiledProgram`] is what
//! gets encoded and handed to the substrate.

use std::fmt;

use hashbrown::HashMap;

use crate::core::{CompileResult, RegId, Target};
use crate::encoder::{self, Encoder, MemoryLayout};
use crate::ir::ast::Function;
use crate::ir::{Instruction, IrBuilder};
use crate::schedule::{ExitMap, Scheduler};

/// A scheduled program with its register writes and initial data memory.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub(crate) target: Target,
    pub(crate) program: Vec<Instruction>,
    pub(crate) sources: Vec<Option<Instruction>>,
    pub(crate) exits: ExitMap,
    pub(crate) data: Vec<i64>,
    pub(crate) preloaded: RegId,
    pub(crate) globals: HashMap<String, RegId>,
}

impl CompiledProgram {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// One instruction per cycle.
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// IR instruction behind each cycle, before its operands were resolved. `None` on no-ops.
    pub fn sources(&self) -> &[Option<Instruction>] {
        &self.sources
    }

    /// Register written on each retiring cycle.
    pub fn exits(&self) -> &ExitMap {
        &self.exits
    }

    /// Finalized data memory: globals, constants, then zeroed scratch.
    pub fn data(&self) -> &[i64] {
        &self.data
    }

    /// Slots holding globals and constants. Scratch registers start here.
    pub fn preloaded(&self) -> RegId {
        self.preloaded
    }

    pub fn globals(&self) -> &HashMap<String, RegId> {
        &self.globals
    }

    pub fn global_slot(&self, name: &str) -> Option<RegId> {
        self.globals.get(name).copied()
    }

    pub fn register_count(&self) -> usize {
        self.data.len()
    }

    /// Memory sizes the substrate must be configured with.
    pub fn layout(&self) -> MemoryLayout {
        MemoryLayout::new(&self.target, self.program.len(), self.data.len())
    }

    /// Encode the program, one word per cycle.
    pub fn encode(&self) -> CompileResult<Vec<u64>> {
        Encoder::new(self.layout())?.encode(&self.program, &self.exits)
    }

    /// Initial data memory as `data_width`-bit two's complement words.
    pub fn data_image(&self) -> Vec<u64> {
        let mask = self.target.data_mask();
        self.data.iter().map(|&value| value as u64 & mask).collect()
    }
}

impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (cycle, isn) in self.program.iter().enumerate() {
            let line = format!("{:4} {:15}", cycle, isn.to_string());
            match self.exits.register_at(cycle as u32) {
                Some(reg) => writeln!(f, "{line} -> r{reg}")?,
                None => writeln!(f, "{}", line.trim_end())?,
            }
        }
        Ok(())
    }
}

/// Compile `function` for `target`.
pub fn compile(target: &Target, function: &Function) -> CompileResult<CompiledProgram> {
    let ir = IrBuilder::new().build(function)?;
    let preloaded = ir.data.len() as RegId;

    let schedule = Scheduler::new(target).schedule(preloaded, ir.instructions)?;
    let data = encoder::finalize_data(ir.data, &schedule);

    log::debug!(
        "compiled `{}`: {} cycles, {} registers ({} preloaded)",
        function.name,
        schedule.len(),
        data.len(),
        preloaded
    );

    Ok(CompiledProgram {
        target: *target,
        program: schedule.instructions,
        sources: schedule.sources,
        exits: schedule.exits,
        data: data.into_values(),
        preloaded,
        globals: ir.globals,
    })
}
