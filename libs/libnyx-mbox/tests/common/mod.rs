//! Shared test support: a recording scheduler and wait helpers

#![allow(dead_code)]

use libnyx_mbox::{BlockReason, HostScheduler, Limits, MailboxId, Messaging, ProcessId, Scheduler};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Scheduler that records every notification it receives
#[derive(Default)]
pub struct RecordingScheduler {
    /// Recorded block calls
    pub blocks: Mutex<Vec<(ProcessId, BlockReason)>>,
    /// Recorded unblock calls
    pub unblocks: Mutex<Vec<ProcessId>>,
    /// Recorded halt codes
    pub halts: Mutex<Vec<i32>>,
    /// Pretend callers run in user mode
    pub user_mode: AtomicBool,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block reasons recorded for `pid`
    pub fn blocks_of(&self, pid: ProcessId) -> Vec<BlockReason> {
        self.blocks
            .lock()
            .iter()
            .filter(|(p, _)| *p == pid)
            .map(|(_, reason)| *reason)
            .collect()
    }

    /// Whether `pid` was ever unblocked
    pub fn was_unblocked(&self, pid: ProcessId) -> bool {
        self.unblocks.lock().contains(&pid)
    }
}

impl Scheduler for RecordingScheduler {
    fn current_pid(&self) -> ProcessId {
        HostScheduler::new().current_pid()
    }

    fn block(&self, pid: ProcessId, reason: BlockReason) {
        self.blocks.lock().push((pid, reason));
    }

    fn unblock(&self, pid: ProcessId) {
        self.unblocks.lock().push(pid);
    }

    fn in_kernel_mode(&self) -> bool {
        !self.user_mode.load(Ordering::SeqCst)
    }

    fn halt(&self, code: i32) -> ! {
        self.halts.lock().push(code);
        panic!("system halted with code {code}");
    }
}

/// Messaging instance wired to a recording scheduler
pub fn messaging(
    max_mailboxes: usize,
    max_slots: usize,
    max_message: usize,
) -> (Arc<Messaging>, Arc<RecordingScheduler>) {
    let sched = RecordingScheduler::new();
    let limits = Limits {
        max_mailboxes,
        max_slots,
        max_message,
    };
    let mb = Arc::new(Messaging::new(limits, sched.clone()));
    (mb, sched)
}

/// Spin until `cond` holds, failing the test after a few seconds
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Wait until `n` senders are blocked on `id`
pub fn wait_for_senders(mb: &Messaging, id: MailboxId, n: usize) {
    wait_until("blocked senders", || {
        mb.info(id).is_some_and(|info| info.blocked_senders.len() == n)
    });
}

/// Wait until `n` receivers are blocked on `id`
pub fn wait_for_receivers(mb: &Messaging, id: MailboxId, n: usize) {
    wait_until("blocked receivers", || {
        mb.info(id).is_some_and(|info| info.blocked_receivers.len() == n)
    });
}
