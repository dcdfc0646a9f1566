//! Initial contents of the shared data memory.
//!
//! Layout, low addresses first:
//! - reserved slots, one per declared global, zero-initialised
//! - interned literals, one slot per distinct value
//! - scratch registers, appended once scheduling knows how many are needed

use hashbrown::HashMap;

use crate::core::RegId;

#[derive(Debug, Clone, Default)]
pub struct DataTable {
    values: Vec<i64>,
    reserved: RegId,
    constants: HashMap<i64, RegId>,
}

impl DataTable {
    /// Table whose first `globals` slots are reserved for persistent variables.
    pub fn with_reserved(globals: RegId) -> Self {
        Self {
            values: vec![0; globals as usize],
            reserved: globals,
            constants: HashMap::new(),
        }
    }

    /// Slot holding `value`, allocating one on first use.
    pub fn intern(&mut self, value: i64) -> RegId {
        if let Some(&slot) = self.constants.get(&value) {
            return slot;
        }
        let slot = self.values.len() as RegId;
        self.values.push(value);
        self.constants.insert(value, slot);
        slot
    }

    /// Slot already holding `value`, if interned.
    pub fn constant_slot(&self, value: i64) -> Option<RegId> {
        self.constants.get(&value).copied()
    }

    /// Number of slots owned by globals.
    pub fn reserved(&self) -> RegId {
        self.reserved
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Zero-extend the table so that slot `len - 1` exists.
    pub fn pad_to(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, 0);
        }
    }

    pub fn into_values(self) -> Vec<i64> {
        self.values
    }
}
