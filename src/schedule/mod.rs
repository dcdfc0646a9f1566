// This module implements the cycle-driven list scheduler and the register allocation that
// happens alongside it. SchedulerState carries everything that changes from one cycle to the
// next: the instructions not yet issued, how many of them still read each virtual register,
// the register file, the exit map and the schedule emitted so far. Each step looks at the
// remaining instructions in IR order and issues the first one whose virtual inputs have all
// retired on an earlier cycle and whose own retirement cycle is still free on the single write
// port; if none qualifies the cycle becomes a no-op. Issuing resolves virtual inputs to the
// physical registers recorded in the exit map, frees the registers of inputs nobody else will
// read, allocates the lowest free register for the result and claims its retirement cycle.
// When nothing is left the schedule is padded so every claimed write lands inside the program.

//! List scheduling with integrated register allocation.
//!
//! ```text
//! cycle  issued            exit
//!     0  <input>           -> r3 @1
//!     1  <add r0 r1>       -> r4 @3
//!     2  <nop>                        ; r4 not retired yet
//!     3  <nop>
//!     4  <mul r4 r2>       -> r4 @7   ; r4 freed on issue, reused for the product
//! ```

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::core::{CompileError, CompileResult, RegId, RegisterFile, Target};
use crate::ir::{Instruction, Operand};

/// A register write retiring on a given cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    /// Virtual register whose value is written.
    pub vreg: Operand,
    /// Physical register receiving it.
    pub reg: RegId,
}

/// Retirement cycle to register write. At most one entry per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitMap {
    entries: BTreeMap<u32, Exit>,
}

impl ExitMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, cycle: u32) -> bool {
        self.entries.contains_key(&cycle)
    }

    /// Reserve the write port on `cycle`.
    pub fn claim(&mut self, cycle: u32, exit: Exit) -> CompileResult<()> {
        if self.is_claimed(cycle) {
            return Err(CompileError::NoWritePort { cycle });
        }
        self.entries.insert(cycle, exit);
        Ok(())
    }

    pub fn get(&self, cycle: u32) -> Option<&Exit> {
        self.entries.get(&cycle)
    }

    /// Register written on `cycle`, if any.
    pub fn register_at(&self, cycle: u32) -> Option<RegId> {
        self.entries.get(&cycle).map(|exit| exit.reg)
    }

    /// Physical register holding `vreg`, provided it retired before `cycle`.
    pub fn resolve(&self, vreg: Operand, cycle: u32) -> Option<RegId> {
        self.entries
            .range(..cycle)
            .find(|(_, exit)| exit.vreg == vreg)
            .map(|(_, exit)| exit.reg)
    }

    pub fn last_cycle(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Exit)> + '_ {
        self.entries.iter().map(|(&cycle, exit)| (cycle, exit))
    }

    /// Cycle to physical register, dropping the virtual names.
    pub fn writes(&self) -> BTreeMap<u32, RegId> {
        self.entries
            .iter()
            .map(|(&cycle, exit)| (cycle, exit.reg))
            .collect()
    }
}

/// Result of scheduling: one instruction per cycle plus the register writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub instructions: Vec<Instruction>,
    /// IR instruction issued on each cycle, `None` for no-ops.
    pub sources: Vec<Option<Instruction>>,
    pub exits: ExitMap,
}

impl Schedule {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Highest physical register read or written anywhere in the schedule.
    pub fn max_register(&self) -> Option<RegId> {
        let reads = self
            .instructions
            .iter()
            .flat_map(|isn| isn.inputs().iter().filter_map(|op| op.as_physical()));
        let writes = self.exits.iter().map(|(_, exit)| exit.reg);
        reads.chain(writes).max()
    }
}

/// What happened on one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Issued { cycle: u32 },
    Stalled { cycle: u32 },
}

/// An instruction that can issue on the current cycle.
struct Ready {
    inputs: Vec<Operand>,
    retire: Option<u32>,
}

/// Complete scheduler state between two cycles.
///
/// Cloning a state snapshots it; stepping the clone replays the following cycles.
#[derive(Debug, Clone)]
pub struct SchedulerState<'t> {
    target: &'t Target,
    remaining: Vec<Instruction>,
    /// Reads of each virtual register by instructions still in `remaining`.
    remaining_uses: HashMap<Operand, u32>,
    registers: RegisterFile,
    exits: ExitMap,
    output: Vec<Instruction>,
    sources: Vec<Option<Instruction>>,
}

impl<'t> SchedulerState<'t> {
    /// Start scheduling `program`; slots `0..reserved` hold globals and constants.
    pub fn new(target: &'t Target, reserved: RegId, program: Vec<Instruction>) -> Self {
        let mut remaining_uses = HashMap::new();
        for isn in &program {
            for &input in isn.inputs().iter().filter(|op| op.is_virtual()) {
                *remaining_uses.entry(input).or_insert(0) += 1;
            }
        }

        Self {
            target,
            remaining: program,
            remaining_uses,
            registers: RegisterFile::new(reserved),
            exits: ExitMap::new(),
            output: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Cycle the next step schedules.
    pub fn cycle(&self) -> u32 {
        self.output.len() as u32
    }

    pub fn is_done(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn remaining(&self) -> &[Instruction] {
        &self.remaining
    }

    pub fn scheduled(&self) -> &[Instruction] {
        &self.output
    }

    pub fn exits(&self) -> &ExitMap {
        &self.exits
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Schedule one cycle: issue the first ready instruction or a no-op.
    pub fn step(&mut self) -> CompileResult<StepOutcome> {
        let cycle = self.cycle();
        let mut candidate = None;
        for (idx, isn) in self.remaining.iter().enumerate() {
            if let Some(ready) = self.ready(cycle, isn)? {
                candidate = Some((idx, ready));
                break;
            }
        }

        match candidate {
            Some((idx, ready)) => {
                self.issue(cycle, idx, ready)?;
                Ok(StepOutcome::Issued { cycle })
            }
            None => {
                log::trace!("cycle {cycle}: stall, {} remaining", self.remaining.len());
                self.output.push(Instruction::nop());
                self.sources.push(None);
                Ok(StepOutcome::Stalled { cycle })
            }
        }
    }

    fn ready(&self, cycle: u32, isn: &Instruction) -> CompileResult<Option<Ready>> {
        let mut inputs = Vec::with_capacity(isn.inputs().len());
        for &input in isn.inputs() {
            if !input.is_virtual() {
                inputs.push(input);
                continue;
            }
            match self.exits.resolve(input, cycle) {
                Some(reg) => inputs.push(Operand::physical(reg)),
                None => return Ok(None),
            }
        }

        let retire = match isn.output() {
            Some(_) => {
                // An output on an opcode without latency never becomes ready.
                let Some(latency) = self.target.latency(isn.opcode()) else {
                    return Ok(None);
                };
                let exit = cycle
                    .checked_add(latency)
                    .ok_or(CompileError::CycleOverflow { cycle })?;
                if self.exits.is_claimed(exit) {
                    return Ok(None);
                }
                Some(exit)
            }
            None => None,
        };

        Ok(Some(Ready { inputs, retire }))
    }

    fn issue(&mut self, cycle: u32, idx: usize, ready: Ready) -> CompileResult<()> {
        let isn = self.remaining.remove(idx);

        for input in isn.inputs().iter().filter(|op| op.is_virtual()) {
            if let Some(count) = self.remaining_uses.get_mut(input) {
                *count -= 1;
            }
        }

        // Operands are read on issue, so a register nobody else reads is free right away.
        for (input, mapped) in isn.inputs().iter().zip(&ready.inputs) {
            if input.is_virtual() && self.remaining_uses.get(input) == Some(&0) {
                self.remaining_uses.remove(input);
                if let Some(reg) = mapped.as_physical() {
                    self.registers.free(reg)?;
                    log::trace!("cycle {cycle}: free r{reg} ({input} dead)");
                }
            }
        }

        if let (Some(vreg), Some(exit)) = (isn.output(), ready.retire) {
            let reg = self.registers.allocate();
            self.exits.claim(exit, Exit { vreg, reg })?;
            log::trace!("cycle {cycle}: issue {isn}, {vreg} -> r{reg} at cycle {exit}");
        } else {
            log::trace!("cycle {cycle}: issue {isn}");
        }

        self.output.push(isn.rewritten(ready.inputs));
        self.sources.push(Some(isn));
        Ok(())
    }

    /// Pad with no-ops so the last write lands inside the program.
    pub fn finish(mut self) -> Schedule {
        if let Some(last) = self.exits.last_cycle() {
            while self.cycle() <= last {
                self.output.push(Instruction::nop());
                self.sources.push(None);
            }
        }
        Schedule {
            instructions: self.output,
            sources: self.sources,
            exits: self.exits,
        }
    }
}

/// Greedy list scheduler for a [`Target`].
pub struct Scheduler<'t> {
    target: &'t Target,
}

impl<'t> Scheduler<'t> {
    pub fn new(target: &'t Target) -> Self {
        Self { target }
    }

    /// Schedule `program`, whose first `reserved` data slots must never be reused.
    pub fn schedule(&self, reserved: RegId, program: Vec<Instruction>) -> CompileResult<Schedule> {
        let count = program.len();
        let mut state = SchedulerState::new(self.target, reserved, program);
        log::trace!(
            "scheduling {count} instructions above {} reserved slots",
            state.registers().reserved()
        );

        // Once every issued write has retired, any instruction with all producers issued
        // is ready; stalling past that point means a producer is missing.
        let limit = self.target.max_latency() + 1;
        let mut stalls = 0;

        while !state.is_done() {
            match state.step()? {
                StepOutcome::Issued { .. } => stalls = 0,
                StepOutcome::Stalled { cycle } => {
                    stalls += 1;
                    if stalls > limit {
                        return Err(CompileError::StallExhaustion { cycle, stalls });
                    }
                }
            }
        }

        let schedule = state.finish();
        log::debug!(
            "scheduled {} instructions into {} cycles, {} register writes",
            count,
            schedule.len(),
            schedule.exits.len()
        );
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    fn v(n: u32) -> Operand {
        Operand::virtual_reg(n)
    }

    fn r(n: RegId) -> Operand {
        Operand::physical(n)
    }

    /// `a = 5 + 3; return a * 4` with data [5, 3, 4].
    fn simple_program() -> Vec<Instruction> {
        vec![
            Instruction::input_to(v(1)),
            Instruction::binary(Opcode::Add, r(0), r(1), v(2)),
            Instruction::binary(Opcode::Mul, v(2), r(2), v(3)),
            Instruction::output_of(v(3)),
        ]
    }

    #[test]
    fn test_exit_map_claims_once() {
        let mut exits = ExitMap::new();
        let exit = Exit { vreg: v(1), reg: 4 };
        exits.claim(3, exit).unwrap();
        assert_eq!(exits.claim(3, exit), Err(CompileError::NoWritePort { cycle: 3 }));
        assert_eq!(exits.register_at(3), Some(4));
        assert_eq!(exits.last_cycle(), Some(3));
    }

    #[test]
    fn test_resolve_requires_earlier_cycle() {
        let mut exits = ExitMap::new();
        exits.claim(3, Exit { vreg: v(2), reg: 5 }).unwrap();
        assert_eq!(exits.resolve(v(2), 3), None);
        assert_eq!(exits.resolve(v(2), 4), Some(5));
        assert_eq!(exits.resolve(v(1), 10), None);
    }

    #[test]
    fn test_simple_schedule() {
        let target = Target::default();
        let schedule = Scheduler::new(&target).schedule(3, simple_program()).unwrap();

        let listing: Vec<String> = schedule.instructions.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            listing,
            vec![
                "<input>",
                "<add r0 r1>",
                "<nop>",
                "<nop>",
                "<mul r4 r2>",
                "<nop>",
                "<nop>",
                "<nop>",
                "<output r4>",
            ]
        );
        assert_eq!(
            schedule.exits.writes().into_iter().collect::<Vec<_>>(),
            vec![(1, 3), (3, 4), (7, 4)]
        );
        assert_eq!(schedule.max_register(), Some(4));
    }

    #[test]
    fn test_step_snapshot_replay() {
        let target = Target::default();
        let mut state = SchedulerState::new(&target, 3, simple_program());

        assert_eq!(state.step().unwrap(), StepOutcome::Issued { cycle: 0 });
        assert_eq!(state.step().unwrap(), StepOutcome::Issued { cycle: 1 });
        let snapshot = state.clone();

        assert_eq!(state.step().unwrap(), StepOutcome::Stalled { cycle: 2 });
        assert_eq!(state.step().unwrap(), StepOutcome::Stalled { cycle: 3 });
        assert_eq!(state.step().unwrap(), StepOutcome::Issued { cycle: 4 });

        let mut replay = snapshot;
        assert_eq!(replay.cycle(), 2);
        assert_eq!(replay.remaining().len(), 2);
        assert_eq!(replay.step().unwrap(), StepOutcome::Stalled { cycle: 2 });
        assert!(replay.registers().is_allocated(4));
    }

    #[test]
    fn test_write_port_collision_stalls() {
        // Two independent multiplies then an add that would retire with the second one.
        let target = Target::default();
        let program = vec![
            Instruction::binary(Opcode::Mul, r(0), r(0), v(1)),
            Instruction::binary(Opcode::Mul, r(0), r(0), v(2)),
            Instruction::binary(Opcode::Add, r(0), r(0), v(3)),
        ];
        let schedule = Scheduler::new(&target).schedule(1, program).unwrap();

        // mul@0 -> 3, mul@1 -> 4, add@2 -> 4 collides, add@3 -> 5.
        let cycles: Vec<u32> = schedule.exits.iter().map(|(c, _)| c).collect();
        assert_eq!(cycles, vec![3, 4, 5]);
        assert_eq!(schedule.instructions[2].opcode(), Opcode::Nop);
        assert_eq!(schedule.instructions[3].opcode(), Opcode::Add);
        assert_eq!(schedule.len(), 6);
    }

    #[test]
    fn test_shared_input_freed_once() {
        let target = Target::default();
        let program = vec![
            Instruction::input_to(v(1)),
            Instruction::binary(Opcode::Add, v(1), v(1), v(2)),
            Instruction::output_of(v(2)),
        ];
        let mut state = SchedulerState::new(&target, 0, program);
        while !state.is_done() {
            state.step().unwrap();
        }
        assert_eq!(state.registers().scratch_in_use(), 0);
        assert_eq!(state.registers().high_water_mark(), Some(0));
    }

    #[test]
    fn test_missing_producer_exhausts() {
        let target = Target::default();
        let program = vec![Instruction::output_of(v(9))];
        let err = Scheduler::new(&target).schedule(0, program).unwrap_err();
        assert!(matches!(err, CompileError::StallExhaustion { .. }));
    }
}
