//! # Execution Contexts
//!
//! A thin owner around glibc's `ucontext_t` family. An [`ExecutionContext`]
//! is the saved CPU state of one logical thread plus the stack it runs on.
//!
//! ## Lifecycle of a thread context
//!
//! ```text
//! capture()        getcontext: a valid snapshot to derive from
//!   └─► attach_stack()   private STACK_SIZE region
//!   └─► set_link()       successor = runner context
//!   └─► set_signal_mask()
//!   └─► prepare()        makecontext: resuming now runs `entry`
//!         └─► transfer() swapcontext into it
//! ```
//!
//! The `ucontext_t` is boxed and never moved afterwards: on x86_64 glibc
//! stores a pointer to the structure's own FP save area inside it.

use std::io;
use std::mem;

use crate::error::{Result, RuntimeError};

/// Saved register state, successor link and private stack of one context.
pub struct ExecutionContext {
    uc: Box<libc::ucontext_t>,
    stack: Option<Box<[u8]>>,
}

impl ExecutionContext {
    /// A zeroed context with no stack. Only meaningful as the `from` side
    /// of a transfer, which fills it in.
    pub fn empty() -> Self {
        Self {
            // Safety: ucontext_t is plain data; all-zero is a valid bit pattern.
            uc: Box::new(unsafe { mem::zeroed() }),
            stack: None,
        }
    }

    /// Snapshot the calling context with `getcontext`.
    pub fn capture() -> Result<Self> {
        let mut ctx = Self::empty();
        if unsafe { libc::getcontext(ctx.as_mut_ptr()) } == -1 {
            return Err(RuntimeError::ContextCapture(io::Error::last_os_error()));
        }
        Ok(ctx)
    }

    /// Allocate a private stack of `size` bytes and point the context at it.
    pub fn attach_stack(&mut self, size: usize) -> Result<()> {
        let mut stack = Vec::new();
        stack
            .try_reserve_exact(size)
            .map_err(|_| RuntimeError::Alloc {
                what: "thread stack",
                bytes: size,
            })?;
        stack.resize(size, 0u8);
        let mut stack = stack.into_boxed_slice();

        self.uc.uc_stack.ss_sp = stack.as_mut_ptr().cast();
        self.uc.uc_stack.ss_size = stack.len();
        self.uc.uc_stack.ss_flags = 0;
        self.stack = Some(stack);
        Ok(())
    }

    /// Size of the private stack, 0 if none is attached.
    pub fn stack_size(&self) -> usize {
        self.stack.as_ref().map_or(0, |s| s.len())
    }

    /// Set the context resumed when this context's function returns.
    pub fn set_link(&mut self, successor: *mut libc::ucontext_t) {
        self.uc.uc_link = successor;
    }

    pub fn link(&self) -> *mut libc::ucontext_t {
        self.uc.uc_link
    }

    /// Signal mask installed when this context is resumed for the first time.
    pub fn set_signal_mask(&mut self, mask: &libc::sigset_t) {
        self.uc.uc_sigmask = *mask;
    }

    /// Finish the context so that resuming it calls `entry` on the private
    /// stack. `entry` receives no arguments; it finds its thread through the
    /// runtime.
    pub fn prepare(&mut self, entry: extern "C" fn()) {
        debug_assert!(self.stack.is_some(), "prepare() needs a stack");
        unsafe { libc::makecontext(self.as_mut_ptr(), entry, 0) };
    }

    pub fn as_mut_ptr(&mut self) -> *mut libc::ucontext_t {
        &mut *self.uc
    }
}

/// Save the running context into `from` and resume `to`.
///
/// Returns when some later transfer resumes `from`.
///
/// # Safety
/// Both pointers must reference live contexts that stay at the same
/// address until they are resumed; `to` must have been filled by
/// `prepare` or by an earlier transfer.
pub unsafe fn transfer(from: *mut libc::ucontext_t, to: *const libc::ucontext_t) -> Result<()> {
    if libc::swapcontext(from, to) == -1 {
        return Err(RuntimeError::Transfer(io::Error::last_os_error()));
    }
    Ok(())
}
