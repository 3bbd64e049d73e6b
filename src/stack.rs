//! Owned fixed-size execution stacks.

use alloc::boxed::Box;
use alloc::vec;

/// Canary written at the lowest addresses of every stack; a thread that
/// grows past it is overflowing.
const GUARD_WORD: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// A heap-allocated execution stack, exclusively owned by one thread
/// record and freed exactly once when that record is reclaimed.
pub(crate) struct Stack {
    mem: Box<[u8]>,
}

impl Stack {
    pub(crate) fn new(size: usize) -> Self {
        let mut mem = vec![0u8; size].into_boxed_slice();
        // The base of a byte allocation has no alignment guarantee.
        unsafe { (mem.as_mut_ptr() as *mut u64).write_unaligned(GUARD_WORD) };
        Stack { mem }
    }

    /// One past the highest usable byte. Context seeding aligns it down.
    pub(crate) fn top(&mut self) -> *mut u8 {
        unsafe { self.mem.as_mut_ptr().add(self.mem.len()) }
    }

    pub(crate) fn guard_intact(&self) -> bool {
        unsafe { (self.mem.as_ptr() as *const u64).read_unaligned() == GUARD_WORD }
    }

    pub(crate) fn size(&self) -> usize {
        self.mem.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_survives_normal_use() {
        let mut stack = Stack::new(8 * 1024);
        assert_eq!(stack.size(), 8 * 1024);
        assert!(!stack.top().is_null());
        assert!(stack.guard_intact());
    }

    #[test]
    fn guard_detects_overwrite() {
        let mut stack = Stack::new(8 * 1024);
        unsafe { stack.mem.as_mut_ptr().write(0) };
        assert!(!stack.guard_intact());
    }
}
