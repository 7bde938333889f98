//! # Unix Interrupt Port
//!
//! The two interrupt sources of the runtime, built on POSIX signals and
//! interval timers:
//!
//! | Source    | Signal      | Timer                         | Handler            |
//! |-----------|-------------|-------------------------------|--------------------|
//! | Quantum   | `SIGALRM`   | `alarm(QUANTUM_SECS)`, re-armed by the handler | `quantum_handler`  |
//! | Profiler  | `SIGVTALRM` | `ITIMER_VIRTUAL`, periodic `PROFILER_INTERVAL_MS` | `profiler_handler` |
//!
//! Both handlers are installed with `SA_RESTART` and a full `sa_mask`, so
//! neither can interrupt itself or the other. That mask is what makes the
//! index update and context transfer in the scheduler atomic.

use core::ffi::c_int;
use core::mem::{self, MaybeUninit};
use core::ptr;
use std::io;

use crate::config::{PROFILER_INTERVAL_USEC, QUANTUM_SECS};
use crate::error::{Result, RuntimeError};
use crate::kernel;
use crate::sync::CriticalSection;

/// Signal driving preemption.
pub const QUANTUM_SIGNAL: c_int = libc::SIGALRM;

/// Signal driving virtual-time accounting.
pub const PROFILER_SIGNAL: c_int = libc::SIGVTALRM;

// ---------------------------------------------------------------------------
// Handler installation
// ---------------------------------------------------------------------------

fn install(signal: c_int, handler: extern "C" fn(c_int)) -> Result<()> {
    let err = |source| RuntimeError::SignalInstall { signal, source };

    // Safety: sigaction is plain data; every field we rely on is set below.
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = handler as libc::sighandler_t;
    action.sa_flags = libc::SA_RESTART;
    if unsafe { libc::sigfillset(&mut action.sa_mask) } == -1 {
        return Err(err(io::Error::last_os_error()));
    }
    if unsafe { libc::sigaction(signal, &action, ptr::null_mut()) } < 0 {
        return Err(err(io::Error::last_os_error()));
    }
    Ok(())
}

/// Install the scheduler as the `SIGALRM` handler.
pub fn install_scheduler() -> Result<()> {
    install(QUANTUM_SIGNAL, quantum_handler)
}

/// Install the profiler as the `SIGVTALRM` handler.
pub fn install_profiler() -> Result<()> {
    install(PROFILER_SIGNAL, profiler_handler)
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Arm the periodic virtual-time timer feeding the profiler.
pub fn arm_profiler() -> Result<()> {
    let period = libc::timeval {
        tv_sec: 0,
        tv_usec: PROFILER_INTERVAL_USEC as libc::suseconds_t,
    };
    let timer = libc::itimerval {
        it_interval: period,
        it_value: period,
    };
    if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &timer, ptr::null_mut()) } < 0 {
        return Err(RuntimeError::TimerArm {
            timer: "virtual",
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Schedule the next quantum interrupt. Replaces any pending one.
#[inline]
pub fn arm_quantum() {
    unsafe { libc::alarm(QUANTUM_SECS) };
}

// ---------------------------------------------------------------------------
// Signal masks
// ---------------------------------------------------------------------------

/// The mask green threads start with: the caller's current mask with both
/// runtime signals unblocked.
///
/// Read it outside a critical section: inside one it captures the section's
/// full mask, and threads would start with every other signal blocked.
pub fn thread_signal_mask() -> libc::sigset_t {
    unsafe {
        let mut mask = MaybeUninit::<libc::sigset_t>::uninit();
        libc::pthread_sigmask(libc::SIG_SETMASK, ptr::null(), mask.as_mut_ptr());
        let mut mask = mask.assume_init();
        libc::sigdelset(&mut mask, QUANTUM_SIGNAL);
        libc::sigdelset(&mut mask, PROFILER_SIGNAL);
        mask
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Keeps the interrupted code's `errno` intact across a handler.
struct SavedErrno(c_int);

impl SavedErrno {
    #[inline]
    fn save() -> Self {
        Self(unsafe { *libc::__errno_location() })
    }
}

impl Drop for SavedErrno {
    #[inline]
    fn drop(&mut self) {
        unsafe { *libc::__errno_location() = self.0 };
    }
}

/// `SIGALRM` handler: re-arm the quantum, then rotate to the next thread.
///
/// Returns only when the interrupted thread is scheduled again.
extern "C" fn quantum_handler(_signal: c_int) {
    let _errno = SavedErrno::save();
    arm_quantum();
    // Safety: installed with a full sa_mask.
    let cs = unsafe { CriticalSection::new() };
    kernel::quantum_expired(&cs);
}

/// `SIGVTALRM` handler: credit one tick to the running thread.
extern "C" fn profiler_handler(_signal: c_int) {
    let _errno = SavedErrno::save();
    // Safety: installed with a full sa_mask.
    let cs = unsafe { CriticalSection::new() };
    kernel::profiler_tick(&cs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_mask_unblocks_runtime_signals() {
        // Full mask inside the section; the runtime signals still come out open.
        let mask = crate::sync::critical_section(|_cs| thread_signal_mask());
        unsafe {
            assert_eq!(libc::sigismember(&mask, QUANTUM_SIGNAL), 0);
            assert_eq!(libc::sigismember(&mask, PROFILER_SIGNAL), 0);
            assert_eq!(libc::sigismember(&mask, libc::SIGUSR1), 1);
        }
    }

    #[test]
    fn test_saved_errno_restored() {
        unsafe { *libc::__errno_location() = libc::EAGAIN };
        {
            let _saved = SavedErrno::save();
            unsafe { *libc::__errno_location() = libc::EINTR };
        }
        assert_eq!(unsafe { *libc::__errno_location() }, libc::EAGAIN);
    }
}
