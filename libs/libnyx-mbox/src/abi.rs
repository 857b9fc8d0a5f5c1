//! Process-facing operations
//!
//! Integer-coded entry points over the process-wide messaging instance.
//! Handles and sizes arrive as raw integers; every failure is reported as a
//! [`Status`](crate::Status) code rather than a typed error.

use crate::config::MessagingConfig;
use crate::device::DeviceTable;
use crate::error::{ConfigError, MailboxError, Result};
use crate::mailbox::MailboxId;
use crate::messaging::{Messaging, Wait};
use crate::sched::Scheduler;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{error, info, trace};

static SYSTEM: OnceCell<System> = OnceCell::new();

/// A booted messaging subsystem with its device table
pub struct System {
    messaging: Arc<Messaging>,
    devices: DeviceTable,
}

impl System {
    /// Build a subsystem from a validated configuration
    pub fn new(
        config: &MessagingConfig,
        sched: Arc<dyn Scheduler>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let messaging = Arc::new(Messaging::new(config.limits, sched));
        let devices = DeviceTable::boot(Arc::clone(&messaging), config)?;

        Ok(Self { messaging, devices })
    }

    /// Mailbox operations
    pub fn messaging(&self) -> &Arc<Messaging> {
        &self.messaging
    }

    /// Device mailboxes
    pub fn devices(&self) -> &DeviceTable {
        &self.devices
    }
}

/// Boot the process-wide subsystem.
///
/// Later calls return the instance created by the first one.
pub fn boot(
    config: &MessagingConfig,
    sched: Arc<dyn Scheduler>,
) -> std::result::Result<&'static System, ConfigError> {
    SYSTEM.get_or_try_init(|| {
        let system = System::new(config, sched)?;
        info!(
            "messaging booted: {} mailboxes, {} slots, {} devices",
            config.limits.max_mailboxes,
            config.limits.max_slots,
            system.devices.devices().len()
        );
        Ok(system)
    })
}

/// The process-wide subsystem, if booted
pub fn system() -> Option<&'static System> {
    SYSTEM.get()
}

fn booted() -> Result<&'static System> {
    system().ok_or_else(|| {
        error!("messaging used before boot");
        MailboxError::InvalidArgument("not booted")
    })
}

fn mailbox_id(raw: i32) -> Result<MailboxId> {
    usize::try_from(raw).map_err(|_| MailboxError::InvalidHandle(i64::from(raw)))
}

fn size(raw: i32) -> Result<usize> {
    usize::try_from(raw).map_err(|_| MailboxError::InvalidArgument("negative size"))
}

fn code(result: Result<usize>) -> i32 {
    match result {
        Ok(value) => value as i32,
        Err(err) => {
            trace!("mailbox call failed: {}", err);
            err.code()
        }
    }
}

/// Create a mailbox. Returns its handle, or -1.
pub fn mailbox_create(capacity: i32, max_message: i32) -> i32 {
    code(create(capacity, max_message))
}

/// Send `len` bytes of `payload`. The payload may be absent only when `len` is 0.
///
/// Returns 0, -1 (invalid), -2 (would block) or -5 (released).
pub fn mailbox_send(handle: i32, payload: Option<&[u8]>, len: i32, block: bool) -> i32 {
    code(send(handle, payload, len, block).map(|()| 0))
}

/// Receive into the first `capacity` bytes of `buf`.
///
/// Returns the message length, -1 (invalid), -2 (would block) or -5 (released).
pub fn mailbox_receive(handle: i32, buf: Option<&mut [u8]>, capacity: i32, block: bool) -> i32 {
    code(receive(handle, buf, capacity, block))
}

/// Free a mailbox. Returns 0 or -1.
pub fn mailbox_free(handle: i32) -> i32 {
    code(free(handle).map(|()| 0))
}

/// Block until the named device completes; its status is written to `status`.
///
/// Returns 0, or -5 if the device mailbox was released.
pub fn wait_device(name: &str, status: &mut i32) -> i32 {
    code(booted().and_then(|system| {
        *status = system.devices.wait_device(name)?;
        Ok(0)
    }))
}

/// Whether any process is waiting on a device
pub fn check_io() -> bool {
    system().is_some_and(|system| system.devices.io_pending())
}

fn create(capacity: i32, max_message: i32) -> Result<usize> {
    let system = booted()?;
    system.messaging.create(size(capacity)?, size(max_message)?)
}

fn send(raw: i32, payload: Option<&[u8]>, len: i32, block: bool) -> Result<()> {
    let system = booted()?;
    let id = mailbox_id(raw)?;
    let len = size(len)?;

    let data = match payload {
        Some(bytes) if len <= bytes.len() => &bytes[..len],
        Some(_) => return Err(MailboxError::InvalidArgument("length exceeds payload")),
        None if len == 0 => &[][..],
        None => return Err(MailboxError::InvalidArgument("missing payload")),
    };

    system.messaging.send(id, data, Wait::from(block))
}

fn receive(raw: i32, buf: Option<&mut [u8]>, capacity: i32, block: bool) -> Result<usize> {
    let system = booted()?;
    let id = mailbox_id(raw)?;
    let capacity = size(capacity)?;

    let mut empty = [0u8; 0];
    let dest = match buf {
        Some(bytes) if capacity <= bytes.len() => &mut bytes[..capacity],
        Some(_) => return Err(MailboxError::InvalidArgument("capacity exceeds buffer")),
        None if capacity == 0 => &mut empty[..],
        None => return Err(MailboxError::InvalidArgument("missing buffer")),
    };

    system.messaging.receive(id, dest, Wait::from(block))
}

fn free(raw: i32) -> Result<()> {
    let system = booted()?;
    system.messaging.free(mailbox_id(raw)?)
}
