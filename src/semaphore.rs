//! # Binary Semaphore
//!
//! A one-word lock/signal primitive for green threads. The word holds 1
//! (available) or 0 (taken). There is no waiter queue and no count: a
//! contended `acquire` keeps exchanging the word with 0 and yields the CPU
//! between attempts, since with a single OS thread nobody could release the
//! semaphore while the waiter spun.
//!
//! One `release` can let more than one spinning waiter through if another
//! thread releases again before they retry, and which waiter wins is
//! decided only by the rotation order.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::Result;
use crate::kernel;

const TAKEN: u32 = 0;
const AVAILABLE: u32 = 1;

/// Binary, non-queued semaphore.
#[derive(Debug)]
#[repr(transparent)]
pub struct BinarySemaphore {
    word: AtomicU32,
}

impl BinarySemaphore {
    /// A semaphore that starts taken when `initial == 0`, available otherwise.
    pub const fn new(initial: u32) -> Self {
        Self {
            word: AtomicU32::new(if initial == 0 { TAKEN } else { AVAILABLE }),
        }
    }

    /// Reset the state. Any non-zero `initial` means available.
    pub fn init(&self, initial: i32) {
        let value = if initial == 0 { TAKEN } else { AVAILABLE };
        self.word.store(value, Ordering::Release);
    }

    /// Mark the semaphore available ("up"). Does not wake anyone; spinning
    /// waiters see it when they are next scheduled.
    pub fn release(&self) {
        self.word.store(AVAILABLE, Ordering::Release);
    }

    /// Take the semaphore ("down"), yielding to other threads while it is
    /// taken.
    ///
    /// # Errors
    /// Fails instead of spinning forever when the yield fails, i.e. when
    /// called outside a running runtime.
    pub fn acquire(&self) -> Result<()> {
        while self.word.swap(TAKEN, Ordering::AcqRel) == TAKEN {
            kernel::yield_now()?;
        }
        Ok(())
    }

    /// One exchange attempt without yielding.
    pub fn try_acquire(&self) -> bool {
        self.word.swap(TAKEN, Ordering::AcqRel) == AVAILABLE
    }

    pub fn is_available(&self) -> bool {
        self.word.load(Ordering::Acquire) == AVAILABLE
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Handle-style `init`; `None` is a no-op.
pub fn sem_init(sem: Option<&BinarySemaphore>, initial: i32) {
    if let Some(sem) = sem {
        sem.init(initial);
    }
}

/// Handle-style `acquire`; `None` succeeds without effect.
pub fn sem_acquire(sem: Option<&BinarySemaphore>) -> Result<()> {
    match sem {
        Some(sem) => sem.acquire(),
        None => Ok(()),
    }
}

/// Handle-style `release`; `None` is a no-op.
pub fn sem_release(sem: Option<&BinarySemaphore>) {
    if let Some(sem) = sem {
        sem.release();
    }
}
