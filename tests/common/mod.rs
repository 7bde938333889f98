//! Helpers for the runtime scenarios. Each scenario is its own test binary
//! with `harness = false`: the runtime must own the only thread that can
//! receive `SIGALRM`/`SIGVTALRM`, and `start` never returns, so a scenario
//! reports its verdict through the process exit status.

#![allow(dead_code)]

use std::hint;
use std::mem::MaybeUninit;
use std::ptr;
use std::thread;
use std::time::Duration;

use uthreads::sync::critical_section;

/// Exit status of a scenario that hung.
pub const TIMED_OUT: i32 = 2;

/// Kill the process with `TIMED_OUT` after `limit`.
///
/// The watchdog thread blocks every signal so the runtime's timer signals
/// keep landing on the main thread.
pub fn watchdog(limit: Duration) {
    unsafe {
        let mut all = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigfillset(all.as_mut_ptr());
        let mut previous = MaybeUninit::<libc::sigset_t>::uninit();
        libc::pthread_sigmask(libc::SIG_BLOCK, all.as_ptr(), previous.as_mut_ptr());

        thread::spawn(move || {
            thread::sleep(limit);
            eprintln!("watchdog: scenario did not finish within {limit:?}");
            std::process::exit(TIMED_OUT);
        });

        libc::pthread_sigmask(libc::SIG_SETMASK, previous.as_ptr(), ptr::null_mut());
    }
}

/// Fail the scenario from inside a green thread.
pub fn fail(message: &str) -> ! {
    critical_section(|_cs| eprintln!("FAIL: {message}"));
    std::process::exit(1)
}

pub fn check(condition: bool, message: &str) {
    if !condition {
        fail(message);
    }
}

/// Pass the scenario from inside a green thread.
pub fn pass(name: &str) -> ! {
    critical_section(|_cs| println!("{name}: ok"));
    std::process::exit(0)
}

/// Burn CPU in user mode so the virtual timer advances.
pub fn burn(iterations: u64) {
    for _ in 0..iterations {
        hint::spin_loop();
    }
}

/// Time left before the pending quantum fires.
///
/// `alarm` is backed by `ITIMER_REAL`, which reads back with microsecond
/// resolution where `alarm` itself only reports whole seconds.
pub fn quantum_remaining() -> Duration {
    let mut current = MaybeUninit::<libc::itimerval>::uninit();
    if unsafe { libc::getitimer(libc::ITIMER_REAL, current.as_mut_ptr()) } != 0 {
        fail("getitimer(ITIMER_REAL) failed");
    }
    let value = unsafe { current.assume_init() }.it_value;
    Duration::from_secs(value.tv_sec as u64) + Duration::from_micros(value.tv_usec as u64)
}
