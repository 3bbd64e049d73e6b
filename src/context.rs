//! Saved machine state and the context switch itself.
//!
//! `switch_context` is the only suspension point in the whole runtime: it
//! saves the caller's callee-saved registers and stack pointer into `from`
//! and restores `to`. Control returns to the caller's logical sequel only
//! when some later switch names its context again.
//!
//! A fresh context is seeded so that the first switch into it lands in a
//! small trampoline, which moves two seeded registers into the argument
//! registers and calls the runtime's task entry.

/// Entry hook invoked on a fresh thread's own stack.
///
/// Arguments are the two opaque words seeded into the fresh context.
pub(crate) type RawTaskEntry = unsafe extern "C" fn(*const (), usize) -> !;

#[cfg(target_arch = "x86_64")]
pub(crate) use x86_64::{switch_context, ThreadContext};

#[cfg(target_arch = "aarch64")]
pub(crate) use aarch64::{switch_context, ThreadContext};

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("unsupported architecture: only x86_64 and aarch64 context switching is implemented");

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use super::RawTaskEntry;

    /// Callee-saved register file per the System V AMD64 ABI.
    ///
    /// Field order is load-bearing: the offsets in the switch assembly
    /// index straight into this struct, and nothing else reads the fields.
    #[repr(C)]
    #[derive(Debug, Clone)]
    #[allow(dead_code)]
    pub struct ThreadContext {
        rsp: u64,
        rbp: u64,
        rbx: u64,
        r12: u64,
        r13: u64,
        r14: u64,
        r15: u64,
        rflags: u64,
    }

    impl ThreadContext {
        /// Context for a thread that is already running on the host stack;
        /// filled in by the first switch away from it.
        pub(crate) const fn zeroed() -> Self {
            ThreadContext {
                rsp: 0,
                rbp: 0,
                rbx: 0,
                r12: 0,
                r13: 0,
                r14: 0,
                r15: 0,
                rflags: 0,
            }
        }

        /// Seed a context so the first switch into it runs
        /// `entry(arg0, arg1)` on the given stack.
        ///
        /// # Safety
        ///
        /// `stack_top` must point one past an exclusively owned, writable
        /// region that stays alive until the context is reclaimed.
        pub(crate) unsafe fn fresh(
            stack_top: *mut u8,
            entry: RawTaskEntry,
            arg0: *const (),
            arg1: usize,
        ) -> Self {
            // Highest 16-byte aligned address inside the stack, with one
            // slot below it holding the trampoline as the `ret` target.
            let top = (stack_top as usize) & !0xf;
            let slot = (top - 8) as *mut u64;
            unsafe { slot.write(thread_trampoline as usize as u64) };
            ThreadContext {
                rsp: slot as u64,
                rbp: 0,
                rbx: 0,
                r12: arg0 as u64,
                r13: arg1 as u64,
                r14: entry as usize as u64,
                r15: 0,
                rflags: 0x202,
            }
        }
    }

    /// # Safety
    ///
    /// Both pointers must reference valid contexts, and `to` must be either
    /// a freshly seeded context or one previously saved by this function.
    #[unsafe(naked)]
    pub(crate) unsafe extern "C" fn switch_context(
        from: *mut ThreadContext,
        to: *const ThreadContext,
    ) {
        core::arch::naked_asm!(
            "
            mov [rdi + 0x00], rsp
            mov [rdi + 0x08], rbp
            mov [rdi + 0x10], rbx
            mov [rdi + 0x18], r12
            mov [rdi + 0x20], r13
            mov [rdi + 0x28], r14
            mov [rdi + 0x30], r15
            pushfq
            pop rax
            mov [rdi + 0x38], rax

            mov rsp, [rsi + 0x00]
            mov rbp, [rsi + 0x08]
            mov rbx, [rsi + 0x10]
            mov r12, [rsi + 0x18]
            mov r13, [rsi + 0x20]
            mov r14, [rsi + 0x28]
            mov r15, [rsi + 0x30]
            push qword ptr [rsi + 0x38]
            popfq

            ret
            "
        );
    }

    /// First landing point of a fresh thread, reached via the seeded `ret`
    /// slot. r12/r13 carry the entry arguments, r14 the entry address.
    #[unsafe(naked)]
    unsafe extern "C" fn thread_trampoline() -> ! {
        core::arch::naked_asm!(
            "
            mov rdi, r12
            mov rsi, r13
            and rsp, -16
            call r14
            ud2
            "
        );
    }
}

#[cfg(target_arch = "aarch64")]
mod aarch64 {
    use super::RawTaskEntry;

    /// Callee-saved register file per AAPCS64, including the lower halves
    /// of v8-v15. Only the switch assembly reads the fields.
    #[repr(C)]
    #[derive(Debug, Clone)]
    #[allow(dead_code)]
    pub struct ThreadContext {
        sp: u64,
        x19: u64,
        x20: u64,
        x21: u64,
        x22: u64,
        x23: u64,
        x24: u64,
        x25: u64,
        x26: u64,
        x27: u64,
        x28: u64,
        x29: u64,
        lr: u64,
        d: [u64; 8],
    }

    impl ThreadContext {
        pub(crate) const fn zeroed() -> Self {
            ThreadContext {
                sp: 0,
                x19: 0,
                x20: 0,
                x21: 0,
                x22: 0,
                x23: 0,
                x24: 0,
                x25: 0,
                x26: 0,
                x27: 0,
                x28: 0,
                x29: 0,
                lr: 0,
                d: [0; 8],
            }
        }

        /// # Safety
        ///
        /// `stack_top` must point one past an exclusively owned, writable
        /// region that stays alive until the context is reclaimed.
        pub(crate) unsafe fn fresh(
            stack_top: *mut u8,
            entry: RawTaskEntry,
            arg0: *const (),
            arg1: usize,
        ) -> Self {
            let mut ctx = Self::zeroed();
            ctx.sp = (stack_top as usize & !0xf) as u64;
            ctx.x19 = arg0 as u64;
            ctx.x20 = arg1 as u64;
            ctx.x21 = entry as usize as u64;
            ctx.lr = thread_trampoline as usize as u64;
            ctx
        }
    }

    /// # Safety
    ///
    /// Both pointers must reference valid contexts, and `to` must be either
    /// a freshly seeded context or one previously saved by this function.
    #[unsafe(naked)]
    pub(crate) unsafe extern "C" fn switch_context(
        from: *mut ThreadContext,
        to: *const ThreadContext,
    ) {
        core::arch::naked_asm!(
            "
            mov x9, sp
            str x9,       [x0, 0x00]
            stp x19, x20, [x0, 0x08]
            stp x21, x22, [x0, 0x18]
            stp x23, x24, [x0, 0x28]
            stp x25, x26, [x0, 0x38]
            stp x27, x28, [x0, 0x48]
            stp x29, x30, [x0, 0x58]
            stp d8,  d9,  [x0, 0x68]
            stp d10, d11, [x0, 0x78]
            stp d12, d13, [x0, 0x88]
            stp d14, d15, [x0, 0x98]

            ldr x9,       [x1, 0x00]
            mov sp, x9
            ldp x19, x20, [x1, 0x08]
            ldp x21, x22, [x1, 0x18]
            ldp x23, x24, [x1, 0x28]
            ldp x25, x26, [x1, 0x38]
            ldp x27, x28, [x1, 0x48]
            ldp x29, x30, [x1, 0x58]
            ldp d8,  d9,  [x1, 0x68]
            ldp d10, d11, [x1, 0x78]
            ldp d12, d13, [x1, 0x88]
            ldp d14, d15, [x1, 0x98]

            ret
            "
        );
    }

    /// First landing point of a fresh thread, reached via the restored lr.
    /// x19/x20 carry the entry arguments, x21 the entry address.
    #[unsafe(naked)]
    unsafe extern "C" fn thread_trampoline() -> ! {
        core::arch::naked_asm!(
            "
            mov x0, x19
            mov x1, x20
            br x21
            "
        );
    }
}
