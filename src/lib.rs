#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod context;
mod results;
mod stack;

pub mod error;
pub mod locks;
pub mod runtime;
pub mod scheduler;
pub mod thread;

pub use error::{RuntimeError, RuntimeResult};
pub use locks::LockId;
pub use runtime::{
    Runtime, RuntimeBuilder, DEFAULT_CONDITIONS_PER_LOCK, DEFAULT_NUM_LOCKS, DEFAULT_STACK_SIZE,
};
pub use scheduler::Scheduler;
pub use thread::{ThreadId, ThreadState};
