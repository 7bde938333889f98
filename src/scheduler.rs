//! # Scheduler
//!
//! Core scheduling state for uthreads: the thread table, the index of the
//! running thread, the runner context and the counters. Implements strict
//! round robin over the Ready slots.
//!
//! ## Scheduling Algorithm
//!
//! On every quantum interrupt (and on every voluntary yield):
//! 1. **Select**: the first Ready slot after `current`, wrapping around,
//!    so the visit order is `0, 1, ..., n-1, 0, ...` with Done slots
//!    skipped
//! 2. **Transfer**: if the selected slot differs from `current`, save the
//!    running context and resume the selected one
//!
//! On every profiler interrupt the slot at `current` is credited one tick.
//!
//! Nothing here touches signals or timers; the kernel calls into this
//! state from inside critical sections and the arch layer's handlers.

use crate::arch::context::ExecutionContext;
use crate::config;
use crate::error::{Result, RuntimeError};
use crate::task::{ThreadEntry, ThreadId, ThreadState, ThreadTable};

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Selections performed (quantum ticks, yields and thread exits).
    pub rotations: u64,
    /// Context transfers actually performed, including the first one.
    pub transfers: u64,
}

/// Outcome of one rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// The running thread is the only Ready one; keep running it.
    Stay,
    /// Save into `from`, resume `to`.
    Transfer {
        from: *mut libc::ucontext_t,
        to: *mut libc::ucontext_t,
    },
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The runtime-owned state object. Built by `kernel::init`, stored in the
/// kernel's global cell, dropped by the next `init`.
pub struct Scheduler {
    table: ThreadTable,
    /// Context of whoever called `start`; successor of every thread context.
    runner: ExecutionContext,
    /// Index of the running slot. Meaningful once `started` is set.
    current: usize,
    started: bool,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Build a scheduler with a table of `config::table_size(requested)` slots.
    pub fn new(requested: i32) -> Result<Self> {
        Ok(Self {
            table: ThreadTable::new(config::table_size(requested))?,
            runner: ExecutionContext::empty(),
            current: 0,
            started: false,
            stats: SchedulerStats::default(),
        })
    }

    /// Register a thread body.
    pub fn spawn(&mut self, entry: ThreadEntry, arg: i32) -> Result<ThreadId> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        let runner = self.runner.as_mut_ptr();
        self.table.register(entry, arg, runner)
    }

    /// Finish every registered context so resuming it runs `trampoline`
    /// with `mask` as its signal mask, and put it in the rotation.
    pub fn prepare_all(&mut self, trampoline: extern "C" fn(), mask: &libc::sigset_t) {
        for slot in self.table.iter_mut() {
            if slot.state == ThreadState::Registered {
                slot.context.set_signal_mask(mask);
                slot.context.prepare(trampoline);
                slot.state = ThreadState::Ready;
            }
        }
    }

    /// Mark the runtime started with slot 0 running, and return the
    /// (runner, first thread) pair for the initial transfer.
    pub fn launch(&mut self) -> Option<(*mut libc::ucontext_t, *mut libc::ucontext_t)> {
        let first = self.table.get_mut(0)?.context.as_mut_ptr();
        self.current = 0;
        self.started = true;
        self.stats.transfers += 1;
        Some((self.runner.as_mut_ptr(), first))
    }

    /// Move `current` to the next Ready slot in circular order.
    ///
    /// The running slot itself is the last candidate, so a lone Ready
    /// thread keeps the CPU. Returns `None` when no slot is Ready.
    pub fn advance(&mut self) -> Option<ThreadId> {
        let n = self.table.len();
        if n == 0 {
            return None;
        }
        let next = (1..=n)
            .map(|step| (self.current + step) % n)
            .find(|&id| self.table.get(id).is_some_and(|slot| slot.is_runnable()))?;
        self.current = next;
        Some(next)
    }

    /// Select the next thread and describe the transfer to perform.
    pub fn rotate(&mut self) -> Option<Rotation> {
        self.stats.rotations += 1;
        let prev = self.current;
        let next = self.advance()?;
        if next == prev {
            return Some(Rotation::Stay);
        }
        let from = self.table.get_mut(prev)?.context.as_mut_ptr();
        let to = self.table.get_mut(next)?.context.as_mut_ptr();
        self.stats.transfers += 1;
        Some(Rotation::Transfer { from, to })
    }

    /// Credit `ms` of virtual time to the running slot.
    pub fn charge_current(&mut self, ms: u64) {
        if let Some(slot) = self.table.get_mut(self.current) {
            slot.charge(ms);
        }
    }

    /// Take the running slot out of the rotation for good.
    pub fn retire_current(&mut self) {
        if let Some(slot) = self.table.get_mut(self.current) {
            slot.state = ThreadState::Done;
        }
    }

    /// Id, body and argument of the running slot.
    pub fn current_entry(&self) -> Option<(ThreadId, ThreadEntry, i32)> {
        self.table
            .get(self.current)
            .map(|slot| (slot.id, slot.entry, slot.arg))
    }

    #[inline]
    pub fn current(&self) -> ThreadId {
        self.current
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.table.len()
    }

    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        self.table.get(id).map(|slot| slot.state)
    }

    /// Virtual time of `id`; 0 for an unknown id.
    pub fn vtime(&self, id: ThreadId) -> u64 {
        self.table.vtime(id)
    }

    #[inline]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::unix::thread_signal_mask;
    use crate::config::{MAX_TAB_SIZE, PROFILER_INTERVAL_MS};

    fn body(_arg: i32) {}

    extern "C" fn never_entered() {}

    /// A launched scheduler with `n` Ready threads. Nothing is transferred.
    fn launched(n: usize) -> Scheduler {
        let mut sched = Scheduler::new(n as i32).unwrap();
        for arg in 0..n {
            sched.spawn(body, arg as i32).unwrap();
        }
        sched.prepare_all(never_entered, &thread_signal_mask());
        assert!(sched.launch().is_some());
        sched
    }

    /// Rotate once and report where `current` landed.
    fn next_target(sched: &mut Scheduler) -> Option<ThreadId> {
        sched.rotate().map(|_| sched.current())
    }

    #[test]
    fn test_fill_every_valid_capacity() {
        for capacity in [config::MIN_TAB_SIZE, 3, 7] {
            let mut sched = Scheduler::new(capacity as i32).unwrap();
            for _ in 0..capacity {
                sched.spawn(body, 0).unwrap();
            }
            assert!(matches!(
                sched.spawn(body, 0),
                Err(RuntimeError::TableFull { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_capacity_behaves_as_max() {
        for requested in [-5, 0, 1, MAX_TAB_SIZE as i32 + 1] {
            let sched = Scheduler::new(requested).unwrap();
            assert_eq!(sched.capacity(), MAX_TAB_SIZE);
        }
    }

    #[test]
    fn test_prepare_moves_to_ready() {
        let mut sched = Scheduler::new(2).unwrap();
        let id = sched.spawn(body, 1).unwrap();
        assert_eq!(sched.thread_state(id), Some(ThreadState::Registered));
        sched.prepare_all(never_entered, &thread_signal_mask());
        assert_eq!(sched.thread_state(id), Some(ThreadState::Ready));
        assert_eq!(sched.thread_state(5), None);
    }

    #[test]
    fn test_launch_starts_at_zero() {
        let sched = launched(3);
        assert!(sched.is_started());
        assert_eq!(sched.current(), 0);
        assert_eq!(sched.stats().transfers, 1);
    }

    #[test]
    fn test_launch_without_threads() {
        let mut sched = Scheduler::new(2).unwrap();
        assert!(sched.launch().is_none());
        assert!(!sched.is_started());
    }

    #[test]
    fn test_spawn_after_launch_rejected() {
        let mut sched = launched(2);
        assert!(matches!(
            sched.spawn(body, 0),
            Err(RuntimeError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_round_robin_order() {
        let mut sched = launched(3);
        let visits: Vec<_> = (0..7).map(|_| next_target(&mut sched).unwrap()).collect();
        assert_eq!(visits, vec![1, 2, 0, 1, 2, 0, 1]);

        let stats = sched.stats();
        assert_eq!(stats.rotations, 7);
        assert_eq!(stats.transfers, 8);
    }

    #[test]
    fn test_rotation_transfers_between_slots() {
        let mut sched = launched(2);
        let from_expected = sched.table.get_mut(0).unwrap().context.as_mut_ptr();
        let to_expected = sched.table.get_mut(1).unwrap().context.as_mut_ptr();
        assert_eq!(
            sched.rotate(),
            Some(Rotation::Transfer {
                from: from_expected,
                to: to_expected
            })
        );
    }

    #[test]
    fn test_done_threads_skipped() {
        let mut sched = launched(3);
        assert_eq!(next_target(&mut sched), Some(1));
        sched.retire_current();
        assert_eq!(sched.thread_state(1), Some(ThreadState::Done));

        let visits: Vec<_> = (0..4).map(|_| next_target(&mut sched).unwrap()).collect();
        assert_eq!(visits, vec![2, 0, 2, 0]);
    }

    #[test]
    fn test_lone_thread_stays() {
        let mut sched = launched(2);
        assert_eq!(next_target(&mut sched), Some(1));
        sched.retire_current();
        assert_eq!(next_target(&mut sched), Some(0));
        assert_eq!(sched.rotate(), Some(Rotation::Stay));
        assert_eq!(sched.current(), 0);
    }

    #[test]
    fn test_empty_rotation() {
        let mut sched = launched(2);
        sched.retire_current();
        assert_eq!(next_target(&mut sched), Some(1));
        sched.retire_current();
        assert_eq!(sched.rotate(), None);
    }

    #[test]
    fn test_profiler_charges_only_current() {
        let mut sched = launched(3);
        sched.charge_current(PROFILER_INTERVAL_MS);
        sched.charge_current(PROFILER_INTERVAL_MS);
        assert_eq!(sched.vtime(0), 2 * PROFILER_INTERVAL_MS);
        assert_eq!(sched.vtime(1), 0);

        next_target(&mut sched);
        sched.charge_current(PROFILER_INTERVAL_MS);
        assert_eq!(sched.vtime(0), 2 * PROFILER_INTERVAL_MS);
        assert_eq!(sched.vtime(1), PROFILER_INTERVAL_MS);
        assert_eq!(sched.vtime(2), 0);
        assert_eq!(sched.vtime(99), 0);
    }

    #[test]
    fn test_current_entry() {
        let mut sched = launched(2);
        next_target(&mut sched);
        let (id, _entry, arg) = sched.current_entry().unwrap();
        assert_eq!(id, 1);
        assert_eq!(arg, 1);
    }
}
