//! # uthreads Configuration
//!
//! Compile-time constants governing the thread table, the scheduling
//! quantum and the profiler tick. Nothing here is read from the
//! environment.

/// Smallest thread table `init` accepts as requested.
pub const MIN_TAB_SIZE: usize = 2;

/// Largest thread table `init` accepts as requested. Also the size used
/// for every request outside `[MIN_TAB_SIZE, MAX_TAB_SIZE]`.
pub const MAX_TAB_SIZE: usize = 128;

/// Per-thread stack size in bytes. Each spawned thread owns one heap
/// allocation of this size for as long as its table lives. There is no
/// guard page: a body that overflows it corrupts the heap undetected.
pub const STACK_SIZE: usize = 64 * 1024;

/// Scheduling quantum in seconds of wall-clock time (`SIGALRM`).
pub const QUANTUM_SECS: u32 = 1;

/// Profiler tick in milliseconds of process CPU time (`SIGVTALRM`).
/// Each tick credits exactly this much to the running thread.
pub const PROFILER_INTERVAL_MS: u64 = 10;

/// Profiler tick expressed in microseconds, as `setitimer` wants it.
pub const PROFILER_INTERVAL_USEC: u64 = PROFILER_INTERVAL_MS * 1000;

/// Resolve a requested table size to the capacity actually allocated.
///
/// The policy is fail-open: a request below `MIN_TAB_SIZE`, above
/// `MAX_TAB_SIZE`, or negative is not rejected but silently replaced with
/// `MAX_TAB_SIZE`. Callers that need to know the effective size read it
/// back from the table.
pub const fn table_size(requested: i32) -> usize {
    if requested < 0 {
        return MAX_TAB_SIZE;
    }
    let requested = requested as usize;
    if requested < MIN_TAB_SIZE || requested > MAX_TAB_SIZE {
        MAX_TAB_SIZE
    } else {
        requested
    }
}
