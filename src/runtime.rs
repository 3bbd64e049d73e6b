//! Runtime construction and configuration.

use alloc::boxed::Box;
use core::ops::Deref;

use crate::scheduler::Scheduler;

pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;
pub const DEFAULT_NUM_LOCKS: usize = 10;
pub const DEFAULT_CONDITIONS_PER_LOCK: usize = 10;

/// Owner of one cooperative runtime.
///
/// Construction is the `init` step: it establishes the calling context as
/// thread 0. The scheduler lives behind a `Box` so its address is stable
/// for as long as the runtime exists; suspended threads keep that address
/// seeded in their saved contexts. `Runtime` derefs to [`Scheduler`], so
/// all operations are called directly on it. Multiple independent
/// runtimes may coexist.
pub struct Runtime {
    sched: Box<Scheduler>,
}

impl Runtime {
    /// A runtime with the default stack size and lock table shape.
    pub fn new() -> Self {
        RuntimeBuilder::new().finish()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Runtime {
    type Target = Scheduler;

    fn deref(&self) -> &Scheduler {
        &self.sched
    }
}

/// Builder for a [`Runtime`] with a non-default configuration.
pub struct RuntimeBuilder {
    stack_size: usize,
    num_locks: usize,
    conditions_per_lock: usize,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            num_locks: DEFAULT_NUM_LOCKS,
            conditions_per_lock: DEFAULT_CONDITIONS_PER_LOCK,
        }
    }

    /// Stack size for every spawned thread (must be at least 4 KiB).
    pub fn stack_size(mut self, size: usize) -> Self {
        assert!(size >= 4 * 1024, "stack size must be at least 4 KiB");
        self.stack_size = size;
        self
    }

    /// Number of binary locks in the table.
    pub fn num_locks(mut self, locks: usize) -> Self {
        self.num_locks = locks;
        self
    }

    /// Number of condition flags carried by each lock.
    pub fn conditions_per_lock(mut self, conditions: usize) -> Self {
        self.conditions_per_lock = conditions;
        self
    }

    pub fn finish(self) -> Runtime {
        Runtime {
            sched: Box::new(Scheduler::new(
                self.stack_size,
                self.num_locks,
                self.conditions_per_lock,
            )),
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
