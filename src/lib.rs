//! # uthreads — user-level threads
//!
//! A green-thread runtime for Linux: a fixed-capacity table of
//! independently-stacked execution contexts, preempted round robin by a
//! real-time interrupt, with per-thread CPU-time accounting driven by a
//! virtual-time interrupt, plus a binary semaphore for synchronization
//! between threads that never run in parallel.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  Application Threads                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · spawn() · start() · get_vtime() · yield_now()│
//! ├──────────────────────────┬─────────────────────────────┤
//! │  Scheduler               │  Sync Primitives            │
//! │  scheduler.rs            │  sync.rs · semaphore.rs     │
//! │  ─ rotate()              │  ─ critical_section         │
//! │  ─ charge_current()      │  ─ BinarySemaphore          │
//! ├──────────────────────────┴─────────────────────────────┤
//! │          Thread Table (task.rs) · config.rs             │
//! ├────────────────────────────────────────────────────────┤
//! │         Platform Port (arch/context.rs, arch/unix.rs)   │
//! │  ucontext transfer · SIGALRM quantum · SIGVTALRM ticks  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! fn worker(n: i32) {
//!     loop {
//!         uthreads::sync::critical_section(|_cs| println!("thread {n}"));
//!         for _ in 0..10_000_000 {
//!             std::hint::spin_loop();
//!         }
//!     }
//! }
//!
//! uthreads::init(2).unwrap();
//! uthreads::spawn(worker, 0).unwrap();
//! uthreads::spawn(worker, 1).unwrap();
//! match uthreads::start() {
//!     Ok(never) => match never {},
//!     Err(err) => eprintln!("runtime failed to start: {err}"),
//! }
//! ```
//!
//! ## Rules for thread bodies
//!
//! - Every green thread runs on the OS thread that called `start`, and a
//!   quantum can land at any instruction. Wrap anything that takes a
//!   process-wide lock (allocation, stdio, the tracing subscriber) in
//!   [`sync::critical_section`].
//! - A body that returns is retired; the others keep rotating. When the
//!   last one returns the process exits with status 1.
//! - Only one runtime exists per process, and it cannot be re-initialized
//!   while it is running.

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("uthreads needs glibc's getcontext/makecontext/swapcontext (linux-gnu targets)");

pub mod arch;
pub mod config;
pub mod error;
pub mod kernel;
pub mod scheduler;
pub mod semaphore;
pub mod sync;
pub mod task;

pub use error::{Result, RuntimeError};
pub use kernel::{
    current_thread, get_vtime, init, spawn, start, stats, thread_count, thread_state, yield_now,
};
pub use scheduler::SchedulerStats;
pub use semaphore::{sem_acquire, sem_init, sem_release, BinarySemaphore};
pub use task::{ThreadEntry, ThreadId, ThreadState};
