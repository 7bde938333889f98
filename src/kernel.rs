//! # Kernel
//!
//! Top-level runtime API for uthreads and the entry points the interrupt
//! handlers call into.
//!
//! The kernel owns the single global [`Scheduler`]. Every public function
//! touches it inside a [`sync::critical_section`]; the handlers in
//! `arch::unix` touch it with their own full signal mask.
//!
//! ## Startup Sequence
//!
//! ```text
//! main()
//!   ├─► kernel::init(capacity)   ← Allocate the thread table
//!   ├─► kernel::spawn(f, arg)    ← Register bodies (×N)
//!   └─► kernel::start()          ← Launch (no return on success)
//!         ├─► Install SIGALRM / SIGVTALRM handlers
//!         ├─► Arm ITIMER_VIRTUAL (profiler)
//!         ├─► makecontext every slot
//!         ├─► alarm(QUANTUM_SECS)
//!         └─► swapcontext(runner → thread 0)
//! ```

use core::cell::UnsafeCell;
use core::convert::Infallible;

use crate::arch::context;
use crate::arch::unix;
use crate::config::{PROFILER_INTERVAL_MS, QUANTUM_SECS};
use crate::error::{Result, RuntimeError};
use crate::scheduler::{Rotation, Scheduler, SchedulerStats};
use crate::sync::{self, CriticalSection};
use crate::task::{ThreadEntry, ThreadId, ThreadState};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

struct RuntimeCell(UnsafeCell<Option<Scheduler>>);

// Safety: the runtime lives on one OS thread and is only reached through
// `runtime()`, which requires every signal to be blocked.
unsafe impl Sync for RuntimeCell {}

static RUNTIME: RuntimeCell = RuntimeCell(UnsafeCell::new(None));

/// The global scheduler slot.
///
/// # Safety
/// No other reference returned by this function may be used while the
/// returned one is live. The token guarantees no handler can run; callers
/// must still not hold the reference across a context transfer.
#[allow(clippy::mut_from_ref)]
unsafe fn runtime(_cs: &CriticalSection) -> &mut Option<Scheduler> {
    &mut *RUNTIME.0.get()
}

/// Report an internal-consistency violation and terminate the process.
pub(crate) fn fatal(message: &str) -> ! {
    tracing::error!("{message}");
    eprintln!("uthreads: {message}");
    std::process::exit(1)
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Allocate a fresh thread table, dropping any previous one.
///
/// `capacity` outside `[MIN_TAB_SIZE, MAX_TAB_SIZE]` (negative included)
/// silently becomes `MAX_TAB_SIZE`; see [`crate::config::table_size`].
///
/// # Errors
/// - `AlreadyStarted` if the runtime is running: the old table holds the
///   stack the caller runs on.
/// - `Alloc` if the table cannot be allocated.
pub fn init(capacity: i32) -> Result<()> {
    sync::critical_section(|cs| {
        let slot = unsafe { runtime(cs) };
        if slot.as_ref().is_some_and(Scheduler::is_started) {
            return Err(RuntimeError::AlreadyStarted);
        }
        *slot = None;

        let scheduler = Scheduler::new(capacity)?;
        tracing::debug!(
            requested = capacity,
            capacity = scheduler.capacity(),
            "thread table initialized"
        );
        *slot = Some(scheduler);
        Ok(())
    })
}

/// Register `entry(arg)` as a new thread and return its id.
///
/// Ids are assigned densely from 0 in registration order.
///
/// # Errors
/// - `NotInitialized` without a prior successful [`init`]
/// - `TableFull` once every slot is taken
/// - `AlreadyStarted` after [`start`]
/// - `ContextCapture` / `Alloc` if the context or its stack cannot be set up
pub fn spawn(entry: ThreadEntry, arg: i32) -> Result<ThreadId> {
    sync::critical_section(|cs| {
        let rt = unsafe { runtime(cs) }
            .as_mut()
            .ok_or(RuntimeError::NotInitialized)?;
        let id = rt.spawn(entry, arg)?;
        tracing::debug!(id, arg, "thread registered");
        Ok(id)
    })
}

/// Start the runtime. **Does not return on success.**
///
/// Installs the scheduler and profiler handlers, arms both timers, and
/// transfers into thread 0. From then on the quantum interrupt rotates
/// through the registered threads forever.
///
/// # Errors
/// Only setup failures come back, before any thread has run:
/// `NotInitialized`, `NoThreads`, `AlreadyStarted`, `SignalInstall`,
/// `TimerArm`, `Transfer`. `RunnerResumed` means a thread context fell
/// through to its successor link, which the trampoline never lets happen.
pub fn start() -> Result<Infallible> {
    let thread_mask = unix::thread_signal_mask();

    sync::critical_section(|cs| {
        let rt = unsafe { runtime(cs) }
            .as_mut()
            .ok_or(RuntimeError::NotInitialized)?;
        if rt.is_started() {
            return Err(RuntimeError::AlreadyStarted);
        }
        if rt.thread_count() == 0 {
            return Err(RuntimeError::NoThreads);
        }

        unix::install_scheduler()?;
        unix::install_profiler()?;
        unix::arm_profiler()?;
        rt.prepare_all(thread_main, &thread_mask);

        tracing::info!(
            threads = rt.thread_count(),
            quantum_secs = QUANTUM_SECS,
            profiler_ms = PROFILER_INTERVAL_MS,
            "starting runtime"
        );
        let (runner, first) = rt.launch().ok_or(RuntimeError::NoThreads)?;
        unix::arm_quantum();

        // Safety: both contexts are boxed inside the global scheduler, which
        // `init` refuses to drop once started.
        unsafe { context::transfer(runner, first) }?;

        tracing::error!("control returned to the runner context");
        Err(RuntimeError::RunnerResumed)
    })
}

/// Accumulated virtual time of `id` in milliseconds.
///
/// Lenient: an unknown id, or no table at all, reads as 0.
pub fn get_vtime(id: ThreadId) -> u64 {
    sync::critical_section(|cs| unsafe { runtime(cs) }.as_ref().map_or(0, |rt| rt.vtime(id)))
}

/// Give the CPU to the next Ready thread right now.
///
/// This is an extra rotation on top of the quantum ticks: the pending
/// quantum is not re-armed, so the next tick still lands on schedule.
/// Returns once this thread is scheduled again.
///
/// # Errors
/// `NotInitialized` / `NotStarted` when there is no running runtime to
/// yield to.
pub fn yield_now() -> Result<()> {
    sync::critical_section(|cs| {
        let rt = unsafe { runtime(cs) }
            .as_ref()
            .ok_or(RuntimeError::NotInitialized)?;
        if !rt.is_started() {
            return Err(RuntimeError::NotStarted);
        }
        tracing::trace!(from = rt.current(), "yield");
        switch_to_next(cs);
        Ok(())
    })
}

/// Id of the running thread, `None` before [`start`].
pub fn current_thread() -> Option<ThreadId> {
    sync::critical_section(|cs| {
        unsafe { runtime(cs) }
            .as_ref()
            .filter(|rt| rt.is_started())
            .map(Scheduler::current)
    })
}

/// Number of registered threads; 0 without a table.
pub fn thread_count() -> usize {
    sync::critical_section(|cs| unsafe { runtime(cs) }.as_ref().map_or(0, Scheduler::thread_count))
}

/// State of thread `id`, `None` if it is not registered.
pub fn thread_state(id: ThreadId) -> Option<ThreadState> {
    sync::critical_section(|cs| unsafe { runtime(cs) }.as_ref()?.thread_state(id))
}

/// Scheduler counters; all zero without a table.
pub fn stats() -> SchedulerStats {
    sync::critical_section(|cs| unsafe { runtime(cs) }.as_ref().map_or_else(SchedulerStats::default, Scheduler::stats))
}

// ---------------------------------------------------------------------------
// Handler entry points
// ---------------------------------------------------------------------------

/// Rotate to the next Ready thread and transfer into it.
///
/// Returns when the thread that was running is resumed.
fn switch_to_next(cs: &CriticalSection) {
    let Some(rt) = (unsafe { runtime(cs) }).as_mut() else {
        fatal("scheduler cannot access the thread table: it does not exist");
    };
    let Some(rotation) = rt.rotate() else {
        fatal("scheduler found no runnable thread");
    };
    if let Rotation::Transfer { from, to } = rotation {
        // Safety: the reference into the runtime is dead past this point;
        // both contexts are boxed and outlive the runtime's started phase.
        if let Err(err) = unsafe { context::transfer(from, to) } {
            fatal(&format!("scheduler: {err}"));
        }
    }
}

/// Called by the `SIGALRM` handler once per quantum.
pub(crate) fn quantum_expired(cs: &CriticalSection) {
    switch_to_next(cs);
}

/// Called by the `SIGVTALRM` handler once per profiler tick.
pub(crate) fn profiler_tick(cs: &CriticalSection) {
    match unsafe { runtime(cs) }.as_mut() {
        Some(rt) => rt.charge_current(PROFILER_INTERVAL_MS),
        None => fatal("profiler cannot access the thread table: it does not exist"),
    }
}

/// First function of every thread context.
///
/// Runs the slot's body, then retires the slot and hands the CPU to the
/// next Ready thread. It never returns, so the runner link is never
/// followed.
extern "C" fn thread_main() {
    let (id, entry, arg) = sync::critical_section(|cs| {
        match unsafe { runtime(cs) }.as_ref().and_then(Scheduler::current_entry) {
            Some(current) => current,
            None => fatal("thread started without a thread table"),
        }
    });

    entry(arg);

    sync::critical_section(|cs| {
        if let Some(rt) = unsafe { runtime(cs) }.as_mut() {
            rt.retire_current();
        }
        tracing::debug!(id, "thread finished");
        switch_to_next(cs);
    });
    fatal("a finished thread was resumed");
}
