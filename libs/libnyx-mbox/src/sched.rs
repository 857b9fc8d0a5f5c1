//! # Scheduler Interface
//!
//! The mailbox subsystem never creates, dispatches or prioritizes processes.
//! Everything it needs from the process scheduler goes through the
//! [`Scheduler`] trait so the real dispatcher, the host implementation and
//! test mocks can be swapped freely.
//!
//! Suspension itself is performed by the mailbox code (see [`crate::wait`]);
//! the scheduler is only told who blocks, why, and when they are woken.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::error;

/// Process identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Create from a raw pid
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw pid value
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Reason a process is blocked inside the mailbox subsystem.
///
/// Discriminants are the block status values reported to the dispatcher.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockReason {
    /// Waiting for a message to arrive
    Receive = 11,
    /// Waiting for room in a mailbox or for a rendezvous partner
    Send = 12,
    /// Waiting for the processes released by `free` to run
    Release = 13,
}

impl BlockReason {
    /// Block status code
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Halt code for kernel-mode violations and slot pool exhaustion
pub const HALT_FATAL: i32 = 1;

/// Halt code for a `wait_device` on a name with no device mailbox
pub const HALT_UNKNOWN_DEVICE: i32 = -1;

/// Process scheduler operations used by the mailbox subsystem
pub trait Scheduler: Send + Sync {
    /// Identity of the calling process
    fn current_pid(&self) -> ProcessId;

    /// The calling process is about to suspend
    fn block(&self, _pid: ProcessId, _reason: BlockReason) {}

    /// A blocked process has been made runnable again
    fn unblock(&self, _pid: ProcessId) {}

    /// Whether the caller runs in kernel mode
    fn in_kernel_mode(&self) -> bool {
        true
    }

    /// Stop the system. Used for conditions the kernel cannot recover from.
    fn halt(&self, code: i32) -> !;
}

static NEXT_PID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static CURRENT_PID: Cell<Option<ProcessId>> = const { Cell::new(None) };
}

/// Scheduler for hosted builds where every OS thread is a kernel process.
///
/// Pids are handed out lazily the first time a thread touches a mailbox.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostScheduler;

impl HostScheduler {
    /// Create a host scheduler
    pub const fn new() -> Self {
        Self
    }
}

impl Scheduler for HostScheduler {
    fn current_pid(&self) -> ProcessId {
        CURRENT_PID.with(|slot| match slot.get() {
            Some(pid) => pid,
            None => {
                let pid = ProcessId(NEXT_PID.fetch_add(1, Ordering::Relaxed));
                slot.set(Some(pid));
                pid
            }
        })
    }

    fn halt(&self, code: i32) -> ! {
        error!(code, "system halted");
        panic!("system halted with code {code}");
    }
}
