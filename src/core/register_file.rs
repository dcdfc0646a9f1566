//! Register allocation and management.
//!
//! The target has a single shared data memory that doubles as its register file: the low
//! slots hold persistent globals and interned constants, everything above is scratch. This
//! module tracks which slots are live and hands out scratch registers lowest-index-first.
//! The file grows on demand, so allocation never fails; the highest index ever handed out
//! decides how large the data memory has to be.

use thiserror::Error;

/// Physical register index into the shared data memory.
pub type RegId = u32;

const BITS_PER_WORD: usize = 64;

/// Growable bit set for tracking register sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegBitSet {
    words: Vec<u64>,
}

impl RegBitSet {
    /// Create empty register set.
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Create register set with registers `0..count` marked.
    pub fn with_prefix(count: RegId) -> Self {
        let mut set = Self::new();
        for reg in 0..count {
            set.set(reg);
        }
        set
    }

    fn split(reg: RegId) -> (usize, u64) {
        let reg = reg as usize;
        (reg / BITS_PER_WORD, 1u64 << (reg % BITS_PER_WORD))
    }

    /// Check if register is set.
    pub fn contains(&self, reg: RegId) -> bool {
        let (word, mask) = Self::split(reg);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Set a register.
    pub fn set(&mut self, reg: RegId) {
        let (word, mask) = Self::split(reg);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= mask;
    }

    /// Clear a register.
    pub fn clear(&mut self, reg: RegId) {
        let (word, mask) = Self::split(reg);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !mask;
        }
    }

    /// Lowest register not in the set.
    pub fn first_clear(&self) -> RegId {
        for (i, word) in self.words.iter().enumerate() {
            if *word != u64::MAX {
                return (i * BITS_PER_WORD) as RegId + word.trailing_ones();
            }
        }
        (self.words.len() * BITS_PER_WORD) as RegId
    }

    /// Number of set registers.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}

/// Error types for register allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegAllocError {
    /// Globals and constants live in the reserved region for the whole program.
    #[error("register r{0} is reserved and cannot be freed")]
    ReservedRegister(RegId),
    /// Register is not allocated.
    #[error("register r{0} is not allocated")]
    NotAllocated(RegId),
}

/// RegisterFile manages scratch allocation above the reserved region.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    /// Number of leading slots owned by globals and constants.
    reserved: RegId,
    /// Currently allocated registers, reserved region included.
    used: RegBitSet,
    /// Highest register ever allocated.
    high_water: Option<RegId>,
}

impl RegisterFile {
    /// Create a register file whose first `reserved` slots are permanently in use.
    pub fn new(reserved: RegId) -> Self {
        Self {
            reserved,
            used: RegBitSet::with_prefix(reserved),
            high_water: None,
        }
    }

    /// Allocate the lowest-numbered free register.
    pub fn allocate(&mut self) -> RegId {
        let reg = self.used.first_clear();
        self.used.set(reg);
        self.high_water = Some(self.high_water.map_or(reg, |hw| hw.max(reg)));
        reg
    }

    /// Return a scratch register to the free pool.
    pub fn free(&mut self, reg: RegId) -> Result<(), RegAllocError> {
        if reg < self.reserved {
            return Err(RegAllocError::ReservedRegister(reg));
        }
        if !self.used.contains(reg) {
            return Err(RegAllocError::NotAllocated(reg));
        }
        self.used.clear(reg);
        Ok(())
    }

    /// Check if register is currently allocated.
    pub fn is_allocated(&self, reg: RegId) -> bool {
        self.used.contains(reg)
    }

    pub fn reserved(&self) -> RegId {
        self.reserved
    }

    /// Number of scratch registers currently live.
    pub fn scratch_in_use(&self) -> u32 {
        self.used.count() - self.reserved
    }

    /// Highest register index handed out so far, if any.
    pub fn high_water_mark(&self) -> Option<RegId> {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regbitset_operations() {
        let mut set = RegBitSet::new();

        assert!(!set.contains(70));
        set.set(70);
        assert!(set.contains(70));
        assert_eq!(set.count(), 1);
        set.clear(70);
        assert!(!set.contains(70));
        assert_eq!(set.first_clear(), 0);
    }

    #[test]
    fn test_first_clear_crosses_words() {
        let set = RegBitSet::with_prefix(64);
        assert_eq!(set.first_clear(), 64);

        let set = RegBitSet::with_prefix(67);
        assert_eq!(set.first_clear(), 67);
    }

    #[test]
    fn test_allocation_skips_reserved_region() {
        let mut regfile = RegisterFile::new(3);
        assert_eq!(regfile.reserved(), 3);
        assert!(regfile.is_allocated(2));

        assert_eq!(regfile.allocate(), 3);
        assert_eq!(regfile.allocate(), 4);
        assert_eq!(regfile.scratch_in_use(), 2);
        assert_eq!(regfile.high_water_mark(), Some(4));
    }

    #[test]
    fn test_lowest_free_is_reused() {
        let mut regfile = RegisterFile::new(0);
        let r0 = regfile.allocate();
        let r1 = regfile.allocate();
        let _r2 = regfile.allocate();

        regfile.free(r1).unwrap();
        regfile.free(r0).unwrap();
        assert_eq!(regfile.allocate(), r0);
        assert_eq!(regfile.allocate(), r1);
        assert_eq!(regfile.high_water_mark(), Some(2));
    }

    #[test]
    fn test_free_errors() {
        let mut regfile = RegisterFile::new(2);

        assert_eq!(regfile.free(1), Err(RegAllocError::ReservedRegister(1)));
        assert_eq!(regfile.free(5), Err(RegAllocError::NotAllocated(5)));

        let reg = regfile.allocate();
        regfile.free(reg).unwrap();
        assert_eq!(regfile.free(reg), Err(RegAllocError::NotAllocated(reg)));
    }
}
