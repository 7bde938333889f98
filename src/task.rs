//! # Thread Slots and the Thread Table
//!
//! Defines the per-thread record of the runtime and the fixed-capacity
//! table that holds them. A slot is created by registration and lives
//! until its whole table is dropped by the next `init`; slots are never
//! freed one by one.

use crate::arch::context::ExecutionContext;
use crate::config::STACK_SIZE;
use crate::error::{Result, RuntimeError};

/// Logical identifier of a registered thread: its index in the table.
pub type ThreadId = usize;

/// Body of a green thread.
pub type ThreadEntry = fn(i32);

// ---------------------------------------------------------------------------
// Thread state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a registered slot.
///
/// ```text
///   spawn()        start()          body returns
///  ────────► Registered ────────► Ready ────────────► Done
/// ```
///
/// A slot that was never registered does not exist: indexes at or past the
/// registration count are unused. `Ready` covers both the running slot (the
/// one at the scheduler's current index) and every slot waiting for its
/// turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Registered with a stack, context not yet finished.
    Registered,
    /// In the rotation.
    Ready,
    /// Body returned; skipped by the rotation from now on.
    Done,
}

// ---------------------------------------------------------------------------
// Thread slot
// ---------------------------------------------------------------------------

/// One registered green thread.
pub struct ThreadSlot {
    pub id: ThreadId,
    pub state: ThreadState,
    /// Saved CPU state and private stack.
    pub context: ExecutionContext,
    pub entry: ThreadEntry,
    pub arg: i32,
    /// Accumulated virtual runtime in milliseconds.
    pub vtime: u64,
}

impl ThreadSlot {
    /// Capture a context, give it a stack and link it to `successor`.
    fn new(
        id: ThreadId,
        entry: ThreadEntry,
        arg: i32,
        successor: *mut libc::ucontext_t,
    ) -> Result<Self> {
        let mut context = ExecutionContext::capture()?;
        context.set_link(successor);
        context.attach_stack(STACK_SIZE)?;
        Ok(Self {
            id,
            state: ThreadState::Registered,
            context,
            entry,
            arg,
            vtime: 0,
        })
    }

    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.state == ThreadState::Ready
    }

    /// Credit `ms` of virtual time to this thread.
    #[inline]
    pub fn charge(&mut self, ms: u64) {
        self.vtime = self.vtime.saturating_add(ms);
    }
}

// ---------------------------------------------------------------------------
// Thread table
// ---------------------------------------------------------------------------

/// Fixed-capacity, bounds-checked sequence of thread slots.
pub struct ThreadTable {
    slots: Vec<ThreadSlot>,
    capacity: usize,
}

impl ThreadTable {
    /// Allocate room for exactly `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| RuntimeError::Alloc {
                what: "thread table",
                bytes: capacity.saturating_mul(core::mem::size_of::<ThreadSlot>()),
            })?;
        Ok(Self { slots, capacity })
    }

    /// Claim the next free slot.
    ///
    /// `successor` is the context a returning body falls through to.
    pub fn register(
        &mut self,
        entry: ThreadEntry,
        arg: i32,
        successor: *mut libc::ucontext_t,
    ) -> Result<ThreadId> {
        if self.is_full() {
            return Err(RuntimeError::TableFull {
                capacity: self.capacity,
            });
        }
        let id = self.slots.len();
        let slot = ThreadSlot::new(id, entry, arg, successor)?;
        self.slots.push(slot);
        Ok(id)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn get(&self, id: ThreadId) -> Option<&ThreadSlot> {
        self.slots.get(id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut ThreadSlot> {
        self.slots.get_mut(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ThreadSlot> {
        self.slots.iter_mut()
    }

    /// Virtual time of `id`, 0 for an id that is not registered.
    pub fn vtime(&self, id: ThreadId) -> u64 {
        self.get(id).map_or(0, |slot| slot.vtime)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
