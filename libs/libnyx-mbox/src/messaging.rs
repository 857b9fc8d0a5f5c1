//! Mailbox operations
//!
//! All shared state (mailbox table and slot pool) sits behind a single lock,
//! held only across the non-blocking part of each operation. A caller that
//! cannot make progress queues itself on the mailbox, drops the lock and parks
//! on its own [`WaitCell`]. The counterpart that makes progress possible
//! finishes the parked operation on its behalf, so a woken process never
//! re-runs the mailbox logic.

use crate::config::Limits;
use crate::error::{MailboxError, Result};
use crate::mailbox::{MailboxId, MailboxInfo, MailboxTable};
use crate::sched::{BlockReason, Scheduler, HALT_FATAL};
use crate::slot::{SlotIndex, SlotPool};
use crate::wait::{Outcome, RecvWaiter, ReleaseLatch, SendWaiter, WaitCell};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Whether an operation may suspend the caller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Suspend until the operation completes or the mailbox is freed
    Blocking,
    /// Fail with `WouldBlock` instead of suspending
    NonBlocking,
}

impl From<bool> for Wait {
    fn from(block: bool) -> Self {
        if block {
            Self::Blocking
        } else {
            Self::NonBlocking
        }
    }
}

/// State guarded by the subsystem lock
struct Kernel {
    pool: SlotPool,
    table: MailboxTable,
}

/// The mailbox subsystem
pub struct Messaging {
    kernel: Mutex<Kernel>,
    sched: Arc<dyn Scheduler>,
    limits: Limits,
}

impl Messaging {
    /// Allocate the mailbox table and slot pool
    pub fn new(limits: Limits, sched: Arc<dyn Scheduler>) -> Self {
        debug!(
            "messaging initialized: {} mailboxes, {} slots of {} bytes",
            limits.max_mailboxes, limits.max_slots, limits.max_message
        );

        Self {
            kernel: Mutex::new(Kernel {
                pool: SlotPool::new(limits.max_slots, limits.max_message),
                table: MailboxTable::new(limits.max_mailboxes),
            }),
            sched,
            limits,
        }
    }

    /// Fixed limits this subsystem was built with
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Scheduler the subsystem reports to
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.sched
    }

    /// Create a mailbox holding up to `capacity` messages of `max_message` bytes.
    ///
    /// A capacity of 0 makes a rendezvous mailbox.
    pub fn create(&self, capacity: usize, max_message: usize) -> Result<MailboxId> {
        self.require_kernel_mode("create");

        if capacity > self.limits.max_slots {
            return Err(MailboxError::InvalidArgument("capacity exceeds slot pool"));
        }
        if max_message == 0 {
            return Err(MailboxError::InvalidArgument("zero message size"));
        }
        if max_message > self.limits.max_message {
            return Err(MailboxError::MessageTooLarge {
                len: max_message,
                limit: self.limits.max_message,
            });
        }

        let id = self
            .kernel
            .lock()
            .table
            .allocate(capacity, max_message)
            .ok_or(MailboxError::TableFull)?;

        debug!("created mailbox {}: capacity {}, max message {}", id, capacity, max_message);
        Ok(id)
    }

    /// Free a mailbox.
    ///
    /// Queued messages go back to the slot pool and every blocked process is
    /// woken with [`MailboxError::Released`]. The caller waits until all of
    /// them have run before the entry becomes reusable.
    pub fn free(&self, id: MailboxId) -> Result<()> {
        self.require_kernel_mode("free");
        let pid = self.sched.current_pid();

        let mut kernel = self.kernel.lock();
        let Kernel { pool, table } = &mut *kernel;
        let mailbox = table.in_use(id)?;

        for slot in mailbox.slots.drain(..) {
            pool.release(slot);
        }

        let latch = ReleaseLatch::new(mailbox.senders.len() + mailbox.receivers.len());
        let mut woken = mailbox.senders.release_all(&latch);
        woken.extend(mailbox.receivers.release_all(&latch));
        mailbox.mark_released();

        for &released in &woken {
            self.sched.unblock(released);
        }
        debug!("freed mailbox {}, released {} waiters", id, woken.len());

        if !woken.is_empty() {
            self.sched.block(pid, BlockReason::Release);
            drop(kernel);

            latch.wait();
            self.sched.unblock(pid);
            kernel = self.kernel.lock();
        }

        if let Some(mailbox) = kernel.table.get_mut(id) {
            mailbox.reclaim();
        }
        Ok(())
    }

    /// Send `payload` to a mailbox.
    ///
    /// A waiting receiver is handed the message directly. Otherwise it is
    /// queued in a slot if the mailbox has room, or the caller blocks (or gets
    /// `WouldBlock`) until a receiver takes it.
    pub fn send(&self, id: MailboxId, payload: &[u8], wait: Wait) -> Result<()> {
        self.require_kernel_mode("send");
        let pid = self.sched.current_pid();

        let mut kernel = self.kernel.lock();
        let Kernel { pool, table } = &mut *kernel;
        let mailbox = table.in_use(id)?;

        let limit = mailbox.max_message().min(self.limits.max_message);
        if payload.len() > limit {
            return Err(MailboxError::MessageTooLarge {
                len: payload.len(),
                limit,
            });
        }

        while let Some(receiver) = mailbox.receivers.pop() {
            if payload.len() > receiver.capacity {
                self.wake(
                    &receiver.cell,
                    Outcome::Rejected(MailboxError::BufferTooSmall {
                        len: payload.len(),
                        capacity: receiver.capacity,
                    }),
                );
                continue;
            }

            trace!(
                "{} handed {} bytes to {} on mailbox {}",
                pid,
                payload.len(),
                receiver.cell.pid(),
                id
            );
            self.wake(&receiver.cell, Outcome::Delivered(payload.to_vec()));
            return Ok(());
        }

        if !mailbox.is_full() {
            let slot = self.alloc_slot(pool, id, payload);
            mailbox.slots.push_back(slot);
            trace!("{} queued {} bytes in mailbox {} slot {}", pid, payload.len(), id, slot);
            return Ok(());
        }

        if wait == Wait::NonBlocking {
            return Err(MailboxError::WouldBlock);
        }

        let cell = WaitCell::new(pid);
        mailbox.senders.push(SendWaiter {
            cell: Arc::clone(&cell),
            payload: payload.to_vec(),
        });
        trace!("{} blocked sending to mailbox {}", pid, id);
        self.sched.block(pid, BlockReason::Send);
        drop(kernel);

        match cell.wait() {
            Outcome::Sent => Ok(()),
            Outcome::Rejected(err) => Err(err),
            Outcome::Released(_ack) => Err(MailboxError::Released),
            Outcome::Delivered(_) => unreachable!("sender {pid} was delivered a message"),
        }
    }

    /// Receive the oldest message of a mailbox into `buf`.
    ///
    /// Returns the message length. A message larger than `buf` is left in
    /// place and the call fails.
    pub fn receive(&self, id: MailboxId, buf: &mut [u8], wait: Wait) -> Result<usize> {
        self.require_kernel_mode("receive");
        let pid = self.sched.current_pid();

        let mut kernel = self.kernel.lock();
        let Kernel { pool, table } = &mut *kernel;
        let mailbox = table.in_use(id)?;

        if let Some(&head) = mailbox.slots.front() {
            let len = pool.payload(head).len();
            if len > buf.len() {
                return Err(MailboxError::BufferTooSmall {
                    len,
                    capacity: buf.len(),
                });
            }

            mailbox.slots.pop_front();
            buf[..len].copy_from_slice(pool.payload(head));
            pool.release(head);
            trace!("{} took {} bytes from mailbox {} slot {}", pid, len, id, head);

            // A slot just opened up; the oldest blocked sender gets it
            if let Some(sender) = mailbox.senders.pop() {
                let slot = self.alloc_slot(pool, id, &sender.payload);
                mailbox.slots.push_back(slot);
                self.wake(&sender.cell, Outcome::Sent);
            }
            return Ok(len);
        }

        // Only a rendezvous mailbox has blocked senders and nothing queued
        if let Some(sender) = mailbox.senders.front() {
            let len = sender.payload.len();
            if len > buf.len() {
                return Err(MailboxError::BufferTooSmall {
                    len,
                    capacity: buf.len(),
                });
            }
        }
        if let Some(sender) = mailbox.senders.pop() {
            let len = sender.payload.len();
            buf[..len].copy_from_slice(&sender.payload);
            trace!("{} took {} bytes from {} on mailbox {}", pid, len, sender.cell.pid(), id);
            self.wake(&sender.cell, Outcome::Sent);
            return Ok(len);
        }

        if wait == Wait::NonBlocking {
            return Err(MailboxError::WouldBlock);
        }

        let cell = WaitCell::new(pid);
        mailbox.receivers.push(RecvWaiter {
            cell: Arc::clone(&cell),
            capacity: buf.len(),
        });
        trace!("{} blocked receiving from mailbox {}", pid, id);
        self.sched.block(pid, BlockReason::Receive);
        drop(kernel);

        match cell.wait() {
            Outcome::Delivered(data) => {
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            Outcome::Rejected(err) => Err(err),
            Outcome::Released(_ack) => Err(MailboxError::Released),
            Outcome::Sent => unreachable!("receiver {pid} completed as a sender"),
        }
    }

    /// Snapshot of a table entry
    pub fn info(&self, id: MailboxId) -> Option<MailboxInfo> {
        self.kernel.lock().table.get(id).map(|mailbox| mailbox.info())
    }

    /// Slots currently on the free list
    pub fn free_slots(&self) -> usize {
        self.kernel.lock().pool.available()
    }

    /// Mailboxes currently in use
    pub fn mailboxes_in_use(&self) -> usize {
        self.kernel.lock().table.in_use_count()
    }

    fn require_kernel_mode(&self, op: &str) {
        if !self.sched.in_kernel_mode() {
            error!("{}: called in user mode", op);
            self.sched.halt(HALT_FATAL);
        }
    }

    fn alloc_slot(&self, pool: &mut SlotPool, id: MailboxId, payload: &[u8]) -> SlotIndex {
        match pool.alloc(id, payload) {
            Some(slot) => slot,
            None => {
                error!("mailbox {}: slot pool exhausted ({} slots)", id, pool.capacity());
                self.sched.halt(HALT_FATAL)
            }
        }
    }

    fn wake(&self, cell: &WaitCell, outcome: Outcome) {
        let pid = cell.pid();
        cell.complete(outcome);
        self.sched.unblock(pid);
    }
}
