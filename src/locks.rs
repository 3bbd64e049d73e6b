//! Fixed-size table of binary locks with level-triggered condition flags.
//!
//! The table only records state; the spinning that makes `lock` and `wait`
//! block lives in the scheduler, because blocking here means yielding.
//! Condition flags are sticky: once signalled they stay set and satisfy any
//! number of past or future waiters. Nothing ever clears them.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{RuntimeError, RuntimeResult};

/// Index into the lock table, fixed at runtime construction.
pub type LockId = usize;

struct LockSlot {
    held: bool,
    conditions: Box<[bool]>,
}

pub(crate) struct LockTable {
    slots: Vec<LockSlot>,
}

impl LockTable {
    pub(crate) fn new(locks: usize, conditions_per_lock: usize) -> Self {
        let slots = (0..locks)
            .map(|_| LockSlot {
                held: false,
                conditions: vec![false; conditions_per_lock].into_boxed_slice(),
            })
            .collect();
        LockTable { slots }
    }

    fn slot(&self, id: LockId) -> RuntimeResult<&LockSlot> {
        self.slots.get(id).ok_or(RuntimeError::InvalidHandle)
    }

    fn slot_mut(&mut self, id: LockId) -> RuntimeResult<&mut LockSlot> {
        self.slots.get_mut(id).ok_or(RuntimeError::InvalidHandle)
    }

    /// Acquire if free. Returns `Ok(false)` when someone else holds the
    /// lock; the caller decides how to wait.
    pub(crate) fn try_acquire(&mut self, id: LockId) -> RuntimeResult<bool> {
        let slot = self.slot_mut(id)?;
        if slot.held {
            Ok(false)
        } else {
            slot.held = true;
            Ok(true)
        }
    }

    /// Releasing a free lock is a no-op.
    pub(crate) fn release(&mut self, id: LockId) -> RuntimeResult<()> {
        self.slot_mut(id)?.held = false;
        Ok(())
    }

    pub(crate) fn is_held(&self, id: LockId) -> RuntimeResult<bool> {
        Ok(self.slot(id)?.held)
    }

    pub(crate) fn condition(&self, id: LockId, cond: usize) -> RuntimeResult<bool> {
        self.slot(id)?
            .conditions
            .get(cond)
            .copied()
            .ok_or(RuntimeError::InvalidHandle)
    }

    pub(crate) fn set_condition(&mut self, id: LockId, cond: usize) -> RuntimeResult<()> {
        let flag = self
            .slot_mut(id)?
            .conditions
            .get_mut(cond)
            .ok_or(RuntimeError::InvalidHandle)?;
        *flag = true;
        Ok(())
    }
}
