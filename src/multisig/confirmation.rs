//! Per-transaction confirmation tracking
//!
//! Owners are positionally stable, so the set of owners that confirmed a
//! transaction is a fixed-width bit-set indexed by owner position.

use crate::multisig::wallet::MultisigError;

/// Width of [`ConfirmationSet`], and therefore the owner limit
pub const MAX_OWNERS: usize = 64;

/// Bit-set of owner positions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfirmationSet(u64);

impl ConfirmationSet {
    fn mask(position: usize) -> u64 {
        debug_assert!(position < MAX_OWNERS, "owner position out of range");
        1u64.checked_shl(position as u32).unwrap_or(0)
    }

    pub fn contains(&self, position: usize) -> bool {
        self.0 & Self::mask(position) != 0
    }

    /// Returns false if the position was already present
    pub fn insert(&mut self, position: usize) -> bool {
        let mask = Self::mask(position);
        let added = self.0 & mask == 0;
        self.0 |= mask;
        added
    }

    /// Returns false if the position was absent
    pub fn remove(&mut self, position: usize) -> bool {
        let mask = Self::mask(position);
        let removed = self.0 & mask != 0;
        self.0 &= !mask;
        removed
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Set positions in ascending order
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_OWNERS).filter(move |&p| self.contains(p))
    }
}

/// Confirmation state for every transaction, indexed by transaction index
#[derive(Clone, Debug, Default)]
pub struct ConfirmationTracker {
    sets: Vec<ConfirmationSet>,
}

impl ConfirmationTracker {
    pub fn new() -> Self {
        Self { sets: Vec::new() }
    }

    fn set(&self, index: usize) -> ConfirmationSet {
        self.sets.get(index).copied().unwrap_or_default()
    }

    fn set_mut(&mut self, index: usize) -> &mut ConfirmationSet {
        if index >= self.sets.len() {
            self.sets.resize(index + 1, ConfirmationSet::default());
        }
        &mut self.sets[index]
    }

    pub fn has_confirmed(&self, index: usize, position: usize) -> bool {
        self.set(index).contains(position)
    }

    /// Record a confirmation and return the new count
    ///
    /// Confirming twice is an error, not a no-op.
    pub fn set_confirmed(&mut self, index: usize, position: usize) -> Result<usize, MultisigError> {
        let set = self.set_mut(index);
        if !set.insert(position) {
            return Err(MultisigError::AlreadyConfirmed(index));
        }
        Ok(set.len())
    }

    /// Remove a confirmation and return the new count
    pub fn clear_confirmed(
        &mut self,
        index: usize,
        position: usize,
    ) -> Result<usize, MultisigError> {
        if !self.set(index).contains(position) {
            return Err(MultisigError::NotConfirmed(index));
        }
        let set = self.set_mut(index);
        set.remove(position);
        Ok(set.len())
    }

    pub fn count_for(&self, index: usize) -> usize {
        self.set(index).len()
    }

    /// Owner positions that confirmed `index`, ascending
    pub fn confirmed_positions(&self, index: usize) -> Vec<usize> {
        self.set(index).positions().collect()
    }
}
