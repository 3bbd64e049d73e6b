//! Per-thread bookkeeping records.

use crate::context::ThreadContext;
use crate::stack::Stack;

/// Stable index of a logical thread. Issued sequentially from 0 (the
/// initial host context) and never reused.
pub type ThreadId = usize;

/// Lifecycle of one logical thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Record exists, first switch into it has not happened yet.
    Created,
    /// Parked in the run queue, waiting for its turn.
    Ready,
    /// The one thread currently executing.
    Running,
    /// Ran to completion or called exit; result published, never
    /// scheduled again.
    Finished,
    /// Swept out of the dead queue, stack released.
    Reclaimed,
}

/// One arena slot. Records are indexed by [`ThreadId`] and persist for the
/// runtime's lifetime; only the stack is released on reclamation.
pub(crate) struct ThreadRecord {
    pub id: ThreadId,
    pub state: ThreadState,
    pub context: ThreadContext,
    /// `None` for thread 0 (which runs on the host stack) and for
    /// reclaimed threads.
    pub stack: Option<Stack>,
}

impl ThreadRecord {
    /// Record for the calling context itself; its register state is
    /// captured by the first switch away from it.
    pub(crate) fn host(id: ThreadId) -> Self {
        ThreadRecord {
            id,
            state: ThreadState::Running,
            context: ThreadContext::zeroed(),
            stack: None,
        }
    }

    pub(crate) fn new(id: ThreadId, context: ThreadContext, stack: Stack) -> Self {
        ThreadRecord {
            id,
            state: ThreadState::Created,
            context,
            stack: Some(stack),
        }
    }
}
