//! # Errors
//!
//! Every recoverable failure of the runtime is a [`RuntimeError`].
//! Internal-consistency violations detected inside a signal handler are not
//! errors: they terminate the process (see `kernel::fatal`).

use std::io;

use thiserror::Error;

/// External status code for a full thread table.
pub const TAB_FULL: i32 = -1;

/// External status code for every other failure.
pub const SYS_ERR: i32 = -2;

/// Failure reported by the runtime API.
///
/// # Error Categories
///
/// ## Caller misuse
/// - [`RuntimeError::NotInitialized`] - no thread table exists
/// - [`RuntimeError::TableFull`] - every slot is registered
/// - [`RuntimeError::AlreadyStarted`] - the runtime is running
/// - [`RuntimeError::NotStarted`] - an operation needs a running runtime
/// - [`RuntimeError::NoThreads`] - `start` with nothing to run
///
/// ## Resource exhaustion
/// - [`RuntimeError::Alloc`] - table or stack allocation failed
///
/// ## OS setup
/// - [`RuntimeError::ContextCapture`], [`RuntimeError::SignalInstall`],
///   [`RuntimeError::TimerArm`], [`RuntimeError::Transfer`]
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `spawn`/`start` before a successful `init`.
    #[error("thread table has not been initialized")]
    NotInitialized,

    /// Registration count has reached the table capacity.
    #[error("thread table is full ({capacity} slots)")]
    TableFull { capacity: usize },

    /// Memory for the table or a thread stack could not be obtained.
    #[error("failed to allocate {what} ({bytes} bytes)")]
    Alloc { what: &'static str, bytes: usize },

    /// `getcontext` failed while registering a thread.
    #[error("failed to capture an execution context")]
    ContextCapture(#[source] io::Error),

    /// `sigaction` (or building its mask) failed.
    #[error("failed to install the handler for signal {signal}")]
    SignalInstall {
        signal: i32,
        #[source]
        source: io::Error,
    },

    /// `setitimer` failed.
    #[error("failed to arm the {timer} timer")]
    TimerArm {
        timer: &'static str,
        #[source]
        source: io::Error,
    },

    /// `swapcontext` reported a failure.
    #[error("context transfer failed")]
    Transfer(#[source] io::Error),

    #[error("runtime is already running")]
    AlreadyStarted,

    #[error("runtime has not been started")]
    NotStarted,

    #[error("no threads are registered")]
    NoThreads,

    /// A thread context fell through to its successor link.
    #[error("control returned to the runner context")]
    RunnerResumed,
}

impl RuntimeError {
    /// Collapse the error to the external status code.
    pub fn code(&self) -> i32 {
        match self {
            RuntimeError::TableFull { .. } => TAB_FULL,
            _ => SYS_ERR,
        }
    }

    /// True for the errors a caller causes by calling in the wrong order
    /// or too often, as opposed to OS or allocation failures.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            RuntimeError::NotInitialized
                | RuntimeError::TableFull { .. }
                | RuntimeError::AlreadyStarted
                | RuntimeError::NotStarted
                | RuntimeError::NoThreads
        )
    }
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RuntimeError::TableFull { capacity: 4 }.code(), TAB_FULL);
        assert_eq!(RuntimeError::NotInitialized.code(), SYS_ERR);
        assert_eq!(
            RuntimeError::Alloc { what: "thread stack", bytes: 64 }.code(),
            SYS_ERR
        );
        assert_ne!(TAB_FULL, SYS_ERR);
    }

    #[test]
    fn test_misuse_classification() {
        assert!(RuntimeError::NotInitialized.is_misuse());
        assert!(RuntimeError::TableFull { capacity: 2 }.is_misuse());
        assert!(!RuntimeError::Alloc { what: "thread table", bytes: 8 }.is_misuse());
        assert!(!RuntimeError::Transfer(io::Error::from_raw_os_error(libc::EINVAL)).is_misuse());
    }

    #[test]
    fn test_display_names_capacity() {
        let msg = RuntimeError::TableFull { capacity: 3 }.to_string();
        assert!(msg.contains('3'));
    }
}
