//! # Blocking Coordinator
//!
//! Per-mailbox FIFO queues of blocked senders and receivers.
//!
//! A process that cannot make progress parks on its own [`WaitCell`] after
//! leaving the subsystem lock. Whoever makes progress possible completes the
//! cell with an [`Outcome`] while holding the lock, so the waiter never has to
//! re-check mailbox state and ordering is decided entirely by queue position.
//!
//! Freeing a mailbox completes every cell with [`Outcome::Released`]. Each
//! released outcome carries a [`ReleaseAck`]; the freeing process waits on the
//! shared [`ReleaseLatch`] until every ack has been dropped.

use crate::error::MailboxError;
use crate::sched::ProcessId;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// How a blocked operation ended
#[derive(Debug)]
pub enum Outcome {
    /// The sender's message was queued or handed to a receiver
    Sent,
    /// The receiver was handed a message
    Delivered(Vec<u8>),
    /// The operation was refused after waking (e.g. receive buffer too small)
    Rejected(MailboxError),
    /// The mailbox was freed out from under the waiter
    Released(ReleaseAck),
}

/// Parking spot for one blocked process
#[derive(Debug)]
pub struct WaitCell {
    pid: ProcessId,
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl WaitCell {
    /// Create an empty cell for `pid`
    pub fn new(pid: ProcessId) -> Arc<Self> {
        Arc::new(Self {
            pid,
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    /// Process parked on this cell
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Hand the outcome to the waiter and wake it
    pub fn complete(&self, outcome: Outcome) {
        let mut slot = self.outcome.lock();
        debug_assert!(slot.is_none(), "{} completed twice", self.pid);
        *slot = Some(outcome);
        self.ready.notify_one();
    }

    /// Suspend until the cell is completed
    pub fn wait(&self) -> Outcome {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.ready.wait(&mut slot);
        }
    }
}

/// Blocked sender and the message it is waiting to deliver
#[derive(Debug)]
pub struct SendWaiter {
    pub cell: Arc<WaitCell>,
    pub payload: Vec<u8>,
}

/// Blocked receiver and the size of the buffer it is waiting to fill
#[derive(Debug)]
pub struct RecvWaiter {
    pub cell: Arc<WaitCell>,
    pub capacity: usize,
}

impl AsRef<WaitCell> for SendWaiter {
    fn as_ref(&self) -> &WaitCell {
        &self.cell
    }
}

impl AsRef<WaitCell> for RecvWaiter {
    fn as_ref(&self) -> &WaitCell {
        &self.cell
    }
}

/// FIFO of blocked processes in arrival order
#[derive(Debug)]
pub struct WaitQueue<W> {
    entries: VecDeque<W>,
}

impl<W: AsRef<WaitCell>> WaitQueue<W> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Append a newly blocked process
    pub fn push(&mut self, waiter: W) {
        self.entries.push_back(waiter);
    }

    /// Oldest waiter, if any
    pub fn front(&self) -> Option<&W> {
        self.entries.front()
    }

    /// Remove the oldest waiter
    pub fn pop(&mut self) -> Option<W> {
        self.entries.pop_front()
    }

    /// Number of blocked processes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is blocked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pids in arrival order
    pub fn pids(&self) -> Vec<ProcessId> {
        self.entries.iter().map(|w| w.as_ref().pid()).collect()
    }

    /// Complete every waiter with a release outcome tied to `latch`.
    ///
    /// Returns the pids woken, oldest first.
    pub fn release_all(&mut self, latch: &Arc<ReleaseLatch>) -> Vec<ProcessId> {
        self.entries
            .drain(..)
            .map(|waiter| {
                let cell = waiter.as_ref();
                cell.complete(Outcome::Released(ReleaseAck::new(latch)));
                cell.pid()
            })
            .collect()
    }
}

impl<W: AsRef<WaitCell>> Default for WaitQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts released processes that have not yet observed their release
#[derive(Debug)]
pub struct ReleaseLatch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl ReleaseLatch {
    /// Latch expecting `count` acknowledgements
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        })
    }

    /// Acknowledgements still outstanding
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    fn ack(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    /// Suspend until every released process has acknowledged
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.done.wait(&mut remaining);
        }
    }
}

/// Proof that a released waiter has run; acknowledges on drop
#[derive(Debug)]
pub struct ReleaseAck {
    latch: Arc<ReleaseLatch>,
}

impl ReleaseAck {
    fn new(latch: &Arc<ReleaseLatch>) -> Self {
        Self { latch: Arc::clone(latch) }
    }
}

impl Drop for ReleaseAck {
    fn drop(&mut self) {
        self.latch.ack();
    }
}
