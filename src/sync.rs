//! # Synchronization Primitives
//!
//! Signal-safe critical section abstractions for the green-thread runtime.
//! The scheduler and profiler run as signal handlers on the one OS thread
//! that hosts every green thread, so "disabling interrupts" means blocking
//! every signal for that thread. All shared runtime state must be accessed
//! within a critical section.

use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;

/// Proof that every signal is blocked for the calling OS thread.
///
/// Handed to the closure of [`critical_section`]. Signal handlers installed
/// by the runtime run with a full `sa_mask` and build their own token.
pub struct CriticalSection {
    // Not Send: the mask belongs to one OS thread.
    _not_send: PhantomData<*mut ()>,
}

impl CriticalSection {
    /// # Safety
    /// The caller must be running with every maskable signal blocked.
    #[inline]
    pub(crate) unsafe fn new() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

/// Blocks every signal on construction and restores the previous mask on
/// drop.
struct SignalMaskGuard {
    previous: libc::sigset_t,
}

impl SignalMaskGuard {
    fn block_all() -> Self {
        unsafe {
            let mut all = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigfillset(all.as_mut_ptr());
            let mut previous = MaybeUninit::<libc::sigset_t>::uninit();
            libc::pthread_sigmask(libc::SIG_BLOCK, all.as_ptr(), previous.as_mut_ptr());
            Self {
                previous: previous.assume_init(),
            }
        }
    }
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, ptr::null_mut());
        }
    }
}

/// Execute a closure with every signal blocked.
///
/// This is the mechanism for touching runtime state from thread context:
/// neither the quantum handler nor the profiler can run until the closure
/// returns. Green-thread bodies also use it around anything that takes a
/// process-wide lock (heap allocation, `println!`), since a body preempted
/// while holding such a lock would deadlock the next body that wants it.
///
/// A context transfer performed inside the closure is fine: the target
/// context brings its own signal mask, and this context gets its mask back
/// when it is resumed.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     println!("vtime so far: {}", uthreads::get_vtime(0));
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let _guard = SignalMaskGuard::block_all();
    // Safety: the guard has blocked every signal until it drops.
    let cs = unsafe { CriticalSection::new() };
    f(&cs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm_blocked() -> bool {
        unsafe {
            let mut current = MaybeUninit::<libc::sigset_t>::uninit();
            libc::pthread_sigmask(libc::SIG_SETMASK, ptr::null(), current.as_mut_ptr());
            libc::sigismember(current.as_ptr(), libc::SIGALRM) == 1
        }
    }

    #[test]
    fn test_critical_section_masks_and_restores() {
        let before = alarm_blocked();
        let inside = critical_section(|_cs| alarm_blocked());
        assert!(inside);
        assert_eq!(alarm_blocked(), before);
    }

    #[test]
    fn test_critical_section_nests() {
        let value = critical_section(|_outer| critical_section(|_inner| alarm_blocked()));
        assert!(value);
        let after_inner = critical_section(|_outer| {
            critical_section(|_inner| ());
            alarm_blocked()
        });
        assert!(after_inner);
    }
}
