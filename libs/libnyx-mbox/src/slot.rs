//! Slot Pool
//!
//! A fixed arena of message buffers shared by every mailbox. Buffers are
//! allocated once at boot; sending and receiving only move indices between
//! the free list and a mailbox's occupied queue.

/// Index of a slot in the pool
pub type SlotIndex = usize;

/// One message buffer
#[derive(Debug)]
struct Slot {
    /// Mailbox currently holding this slot, `None` while on the free list
    owner: Option<usize>,
    /// Payload length in bytes
    len: usize,
    /// Backing storage, sized to the global maximum message
    data: Box<[u8]>,
}

/// Fixed-size pool of message slots
#[derive(Debug)]
pub struct SlotPool {
    slots: Vec<Slot>,
    free: Vec<SlotIndex>,
}

impl SlotPool {
    /// Create a pool of `count` slots of `max_message` bytes each
    pub fn new(count: usize, max_message: usize) -> Self {
        let slots = (0..count)
            .map(|_| Slot {
                owner: None,
                len: 0,
                data: vec![0u8; max_message].into_boxed_slice(),
            })
            .collect();
        // Lowest index on top of the stack
        let free = (0..count).rev().collect();

        Self { slots, free }
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots on the free list
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Take a slot off the free list for `owner` and copy `payload` into it.
    ///
    /// Returns `None` when the pool is exhausted.
    pub fn alloc(&mut self, owner: usize, payload: &[u8]) -> Option<SlotIndex> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index];
        debug_assert!(slot.owner.is_none(), "slot {index} on free list has an owner");

        slot.data[..payload.len()].copy_from_slice(payload);
        slot.len = payload.len();
        slot.owner = Some(owner);
        Some(index)
    }

    /// Payload stored in an allocated slot
    pub fn payload(&self, index: SlotIndex) -> &[u8] {
        let slot = &self.slots[index];
        &slot.data[..slot.len]
    }

    /// Mailbox owning an allocated slot
    pub fn owner(&self, index: SlotIndex) -> Option<usize> {
        self.slots[index].owner
    }

    /// Return a slot to the free list
    pub fn release(&mut self, index: SlotIndex) {
        let slot = &mut self.slots[index];
        debug_assert!(slot.owner.is_some(), "slot {index} released twice");

        slot.owner = None;
        slot.len = 0;
        self.free.push(index);
    }
}
