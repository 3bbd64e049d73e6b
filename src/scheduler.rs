//! The scheduler: thread creation, FIFO rotation, join, exit, and the
//! blocking faces of the lock table.
//!
//! Exactly one logical thread runs at any instant; interleaving happens
//! only at the voluntary context switch inside [`Scheduler::yield_now`]
//! (reached transitively from spawn, exit, join, lock and wait). Because
//! nothing preempts, scheduler state needs no atomics: every operation
//! briefly borrows the state, drops the borrow, and only then switches.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::Any;
use core::cell::UnsafeCell;
use core::ptr::{addr_of, addr_of_mut};

use log::{debug, trace};

use crate::context::{switch_context, ThreadContext};
use crate::error::{RuntimeError, RuntimeResult};
use crate::locks::{LockId, LockTable};
use crate::results::ResultStore;
use crate::stack::Stack;
use crate::thread::{ThreadId, ThreadRecord, ThreadState};

/// Type-erased thread body. Double-boxed so it travels through one
/// register into the fresh thread's entry.
type TaskFn = Box<dyn FnOnce(&Scheduler) -> Rc<dyn Any>>;

struct Inner {
    /// Arena of all issued threads, indexed by id. Slots persist; only
    /// stacks are released.
    records: Vec<ThreadRecord>,
    results: ResultStore,
    /// Runnable threads in strict FIFO order. The current thread is not a
    /// member while it runs.
    run_queue: VecDeque<ThreadId>,
    /// Finished threads awaiting stack release. Unordered.
    dead_queue: Vec<ThreadId>,
    locks: LockTable,
    current: ThreadId,
    stack_size: usize,
}

/// One independent cooperative runtime instance.
///
/// Construct it through [`Runtime`](crate::Runtime), which pins it on the
/// heap; suspended threads keep its address seeded in their contexts.
/// Contains `Rc` values and an `UnsafeCell`, so it is neither `Send` nor
/// `Sync`: everything happens on the one host thread that created it.
pub struct Scheduler {
    inner: UnsafeCell<Inner>,
}

impl Inner {
    /// Release the stack of every dead-queue member except the current
    /// thread. A finished thread that swept itself still runs on its own
    /// stack; it stays parked until another thread reclaims it.
    fn reclaim(&mut self) {
        let current = self.current;
        let mut i = 0;
        while i < self.dead_queue.len() {
            let id = self.dead_queue[i];
            if id == current {
                i += 1;
                continue;
            }
            self.dead_queue.swap_remove(i);
            let record = &mut self.records[id];
            record.stack = None;
            record.state = ThreadState::Reclaimed;
            debug!("reclaimed stack of thread {}", record.id);
        }
    }
}

impl Scheduler {
    /// Establishes the calling context as thread 0.
    pub(crate) fn new(stack_size: usize, locks: usize, conditions_per_lock: usize) -> Self {
        let mut records = Vec::new();
        records.push(ThreadRecord::host(0));
        let mut results = ResultStore::new();
        results.register(0);
        Scheduler {
            inner: UnsafeCell::new(Inner {
                records,
                results,
                run_queue: VecDeque::new(),
                dead_queue: Vec::new(),
                locks: LockTable::new(locks, conditions_per_lock),
                current: 0,
                stack_size,
            }),
        }
    }

    /// # Safety
    /// Only one borrow may be live at a time. Every operation re-derives
    /// it and lets it end before any context switch.
    #[allow(clippy::mut_from_ref)]
    unsafe fn inner(&self) -> &mut Inner {
        unsafe { &mut *self.inner.get() }
    }

    /// Id of the thread executing right now.
    pub fn current_thread(&self) -> ThreadId {
        unsafe { self.inner() }.current
    }

    /// Number of thread ids issued so far, including thread 0.
    pub fn threads_issued(&self) -> usize {
        unsafe { self.inner() }.records.len()
    }

    /// Create a thread and switch straight onto it; the body starts
    /// running immediately and the caller resumes once it is scheduled
    /// again, receiving the new id.
    ///
    /// The body runs to completion (or calls [`exit`](Self::exit)); its
    /// return value is published and stays retrievable through
    /// [`join`](Self::join) forever. A panic inside the body aborts the
    /// process; nothing unwinds across a context switch.
    pub fn spawn<F, R>(&self, f: F) -> ThreadId
    where
        F: FnOnce(&Scheduler) -> R + 'static,
        R: Any,
    {
        let task: TaskFn = Box::new(move |sched| Rc::new(f(sched)) as Rc<dyn Any>);
        self.spawn_raw(Box::into_raw(Box::new(task)))
    }

    fn spawn_raw(&self, task: *mut TaskFn) -> ThreadId {
        let (id, from, to) = {
            let inner = unsafe { self.inner() };
            let id = inner.records.len();
            let mut stack = Stack::new(inner.stack_size);
            let context = unsafe {
                ThreadContext::fresh(
                    stack.top(),
                    task_entry,
                    self as *const Scheduler as *const (),
                    task as usize,
                )
            };
            let stack_bytes = stack.size();
            inner.records.push(ThreadRecord::new(id, context, stack));
            inner.results.register(id);

            let cur = inner.current;
            inner.records[cur].state = ThreadState::Ready;
            inner.run_queue.push_back(cur);
            inner.records[id].state = ThreadState::Running;
            inner.current = id;
            debug!("spawned thread {} ({} bytes of stack)", id, stack_bytes);

            let base = inner.records.as_mut_ptr();
            (id, unsafe { addr_of_mut!((*base.add(cur)).context) }, unsafe {
                addr_of!((*base.add(id)).context)
            })
        };
        unsafe { switch_context(from, to) };
        id
    }

    /// Hand the execution context to the next runnable thread, FIFO order.
    ///
    /// The caller goes to the run-queue tail, behind everyone already
    /// waiting. Finished threads found at the head are swept into the dead
    /// queue (triggering reclamation) rather than run. With no distinct
    /// runnable thread this is a no-op.
    pub fn yield_now(&self) {
        let switch = {
            let inner = unsafe { self.inner() };
            let cur = inner.current;
            if !inner.dead_queue.contains(&cur) {
                if inner.records[cur].state == ThreadState::Running {
                    inner.records[cur].state = ThreadState::Ready;
                }
                inner.run_queue.push_back(cur);
            }

            let mut swept = false;
            let mut next = None;
            while let Some(cand) = inner.run_queue.pop_front() {
                if inner.records[cand].state == ThreadState::Finished {
                    trace!("sweeping finished thread {} into the dead queue", cand);
                    inner.dead_queue.push(cand);
                    swept = true;
                    continue;
                }
                next = Some(cand);
                break;
            }
            if swept {
                inner.reclaim();
            }

            match next {
                Some(next) if next != cur => {
                    if let Some(stack) = &inner.records[cur].stack {
                        debug_assert!(stack.guard_intact(), "stack overflow on thread {}", cur);
                    }
                    inner.records[next].state = ThreadState::Running;
                    inner.current = next;
                    trace!("switching from thread {} to thread {}", cur, next);
                    let base = inner.records.as_mut_ptr();
                    Some((unsafe { addr_of_mut!((*base.add(cur)).context) }, unsafe {
                        addr_of!((*base.add(next)).context)
                    }))
                }
                found => {
                    // Either the queue emptied or the caller came straight
                    // back out of it: keep running.
                    if found == Some(cur) && inner.records[cur].state == ThreadState::Ready {
                        inner.records[cur].state = ThreadState::Running;
                    }
                    None
                }
            }
        };
        if let Some((from, to)) = switch {
            unsafe { switch_context(from, to) };
        }
    }

    /// Busy-wait (by yielding) until thread `id` has finished and been
    /// swept, then return a handle to its published result. Joining an
    /// already-finished thread returns at once; an id that was never
    /// issued is rejected without blocking.
    ///
    /// The caller stays schedulable and burns a turn on every failed
    /// check. Joining the current thread never returns.
    pub fn join(&self, id: ThreadId) -> RuntimeResult<Rc<dyn Any>> {
        if id >= unsafe { self.inner() }.records.len() {
            return Err(RuntimeError::UnknownThread);
        }
        loop {
            let done = {
                let inner = unsafe { self.inner() };
                inner.records[id].state == ThreadState::Reclaimed
                    || inner.dead_queue.contains(&id)
            };
            if done {
                break;
            }
            self.yield_now();
        }
        let inner = unsafe { self.inner() };
        inner.results.lookup(id).ok_or(RuntimeError::UnknownThread)
    }

    /// Finish the current thread with `value` as its published result.
    /// Reclaims pending dead threads first, then yields away for good.
    pub fn exit<R: Any>(&self, value: R) -> ! {
        self.retire(Rc::new(value))
    }

    fn retire(&self, value: Rc<dyn Any>) -> ! {
        {
            let inner = unsafe { self.inner() };
            inner.reclaim();
            let cur = inner.current;
            inner.records[cur].state = ThreadState::Finished;
            inner.results.publish(cur, value);
            debug!("thread {} finished", cur);
        }
        // Never scheduled again once swept; the first yield normally does
        // not come back here.
        loop {
            self.yield_now();
        }
    }

    /// Acquire a binary lock, yielding while someone else holds it. The
    /// observed-free to marked-held transition happens with no intervening
    /// yield, which is what makes it race-free under cooperative
    /// scheduling.
    pub fn lock(&self, id: LockId) -> RuntimeResult<()> {
        loop {
            let acquired = unsafe { self.inner() }.locks.try_acquire(id)?;
            if acquired {
                trace!("thread {} acquired lock {}", self.current_thread(), id);
                return Ok(());
            }
            self.yield_now();
        }
    }

    /// Release a binary lock. Releasing a free lock is a no-op.
    pub fn unlock(&self, id: LockId) -> RuntimeResult<()> {
        unsafe { self.inner() }.locks.release(id)
    }

    /// Yield until condition `cond` of lock `id` has been signalled.
    ///
    /// Fails with [`RuntimeError::LockNotHeld`] when the lock is free at
    /// entry; held by *anyone* suffices, not necessarily the caller. The
    /// flag is never cleared: a signal before the call satisfies it just
    /// as well as one after, and one signal releases every waiter.
    pub fn wait(&self, id: LockId, cond: usize) -> RuntimeResult<()> {
        {
            let inner = unsafe { self.inner() };
            // Bounds first, so an out-of-range handle is always
            // InvalidHandle rather than LockNotHeld.
            inner.locks.condition(id, cond)?;
            if !inner.locks.is_held(id)? {
                return Err(RuntimeError::LockNotHeld);
            }
        }
        loop {
            if unsafe { self.inner() }.locks.condition(id, cond)? {
                return Ok(());
            }
            self.yield_now();
        }
    }

    /// Set condition `cond` of lock `id`. Requires no lock, never yields,
    /// and stays set forever.
    pub fn signal(&self, id: LockId, cond: usize) -> RuntimeResult<()> {
        unsafe { self.inner() }.locks.set_condition(id, cond)
    }
}

/// First Rust frame of every spawned thread, entered from the context
/// trampoline on the thread's own stack. Runs the body, publishes its
/// return value, and never returns.
unsafe extern "C" fn task_entry(sched: *const (), task: usize) -> ! {
    let sched = unsafe { &*(sched as *const Scheduler) };
    let task = unsafe { Box::from_raw(task as *mut TaskFn) };
    let value = (*task)(sched);
    sched.retire(value)
}
