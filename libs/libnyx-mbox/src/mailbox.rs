//! Mailbox Table
//!
//! Fixed array of mailbox control blocks indexed by handle. A control block
//! owns its identity, limits, the queue of occupied slots and the wait queues
//! of processes blocked on it. It never owns the processes themselves.

use crate::error::{MailboxError, Result};
use crate::sched::ProcessId;
use crate::slot::SlotIndex;
use crate::wait::{RecvWaiter, SendWaiter, WaitQueue};
use std::collections::VecDeque;

/// Mailbox handle
pub type MailboxId = usize;

/// Lifecycle state of a table entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailboxStatus {
    /// Free for `create`
    Empty,
    /// Created and accepting operations
    InUse,
    /// Freed; waiting for released processes to run before reuse
    Released,
}

/// Buffering class, derived from capacity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailboxKind {
    /// Capacity 0: direct hand-off between sender and receiver
    ZeroSlot,
    /// Capacity 1
    SingleSlot,
    /// Capacity greater than 1
    MultiSlot,
}

impl MailboxKind {
    /// Classify a capacity
    pub const fn for_capacity(capacity: usize) -> Self {
        match capacity {
            0 => Self::ZeroSlot,
            1 => Self::SingleSlot,
            _ => Self::MultiSlot,
        }
    }
}

/// Snapshot of one mailbox
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxInfo {
    pub id: MailboxId,
    pub kind: MailboxKind,
    pub status: MailboxStatus,
    pub capacity: usize,
    pub max_message: usize,
    pub occupied: usize,
    pub blocked_senders: Vec<ProcessId>,
    pub blocked_receivers: Vec<ProcessId>,
}

/// Mailbox control block
#[derive(Debug)]
pub struct Mailbox {
    id: MailboxId,
    status: MailboxStatus,
    capacity: usize,
    max_message: usize,
    /// Occupied slots, oldest at the front
    pub slots: VecDeque<SlotIndex>,
    /// Processes blocked in send
    pub senders: WaitQueue<SendWaiter>,
    /// Processes blocked in receive
    pub receivers: WaitQueue<RecvWaiter>,
}

impl Mailbox {
    fn empty(id: MailboxId) -> Self {
        Self {
            id,
            status: MailboxStatus::Empty,
            capacity: 0,
            max_message: 0,
            slots: VecDeque::new(),
            senders: WaitQueue::new(),
            receivers: WaitQueue::new(),
        }
    }

    /// Handle of this mailbox
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Current lifecycle state
    pub fn status(&self) -> MailboxStatus {
        self.status
    }

    /// Maximum number of queued messages
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest payload accepted
    pub fn max_message(&self) -> usize {
        self.max_message
    }

    /// Buffering class
    pub fn kind(&self) -> MailboxKind {
        MailboxKind::for_capacity(self.capacity)
    }

    /// Number of queued messages
    pub fn occupied(&self) -> usize {
        self.slots.len()
    }

    /// Whether a send needs to block or hand off rather than queue
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Mark freed. Queued slots and waiters must already be drained.
    pub fn mark_released(&mut self) {
        debug_assert!(self.slots.is_empty());
        debug_assert!(self.senders.is_empty() && self.receivers.is_empty());
        self.status = MailboxStatus::Released;
        self.capacity = 0;
        self.max_message = 0;
    }

    /// Return a released entry to the pool of free table entries
    pub fn reclaim(&mut self) {
        debug_assert_eq!(self.status, MailboxStatus::Released);
        self.status = MailboxStatus::Empty;
    }

    /// Snapshot for diagnostics
    pub fn info(&self) -> MailboxInfo {
        MailboxInfo {
            id: self.id,
            kind: self.kind(),
            status: self.status,
            capacity: self.capacity,
            max_message: self.max_message,
            occupied: self.occupied(),
            blocked_senders: self.senders.pids(),
            blocked_receivers: self.receivers.pids(),
        }
    }
}

/// Fixed-size table of mailboxes
#[derive(Debug)]
pub struct MailboxTable {
    boxes: Vec<Mailbox>,
}

impl MailboxTable {
    /// Create a table with `size` empty entries
    pub fn new(size: usize) -> Self {
        Self {
            boxes: (0..size).map(Mailbox::empty).collect(),
        }
    }

    /// Number of entries
    pub fn size(&self) -> usize {
        self.boxes.len()
    }

    /// Claim the first empty entry.
    ///
    /// Returns `None` when every entry is in use or awaiting reclaim.
    pub fn allocate(&mut self, capacity: usize, max_message: usize) -> Option<MailboxId> {
        let mailbox = self
            .boxes
            .iter_mut()
            .find(|mb| mb.status == MailboxStatus::Empty)?;

        mailbox.slots.clear();
        mailbox.slots.reserve(capacity);
        mailbox.capacity = capacity;
        mailbox.max_message = max_message;
        mailbox.status = MailboxStatus::InUse;
        Some(mailbox.id)
    }

    /// Look up an in-use mailbox
    pub fn in_use(&mut self, id: MailboxId) -> Result<&mut Mailbox> {
        let mailbox = self
            .boxes
            .get_mut(id)
            .ok_or(MailboxError::InvalidHandle(id as i64))?;

        if mailbox.status != MailboxStatus::InUse {
            return Err(MailboxError::NotInUse(id));
        }
        Ok(mailbox)
    }

    /// Any entry, regardless of state
    pub fn get(&self, id: MailboxId) -> Option<&Mailbox> {
        self.boxes.get(id)
    }

    /// Mutable access to any entry, regardless of state
    pub fn get_mut(&mut self, id: MailboxId) -> Option<&mut Mailbox> {
        self.boxes.get_mut(id)
    }

    /// Number of entries currently in use
    pub fn in_use_count(&self) -> usize {
        self.boxes
            .iter()
            .filter(|mb| mb.status == MailboxStatus::InUse)
            .count()
    }
}
