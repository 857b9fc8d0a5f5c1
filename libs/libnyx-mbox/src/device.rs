//! Device mailboxes
//!
//! Every configured device gets a dedicated mailbox at boot. Interrupt
//! handlers post a status word into it without blocking; a process waits for
//! the next completion with [`DeviceTable::wait_device`].

use crate::config::{DeviceKind, MessagingConfig};
use crate::error::{ConfigError, MailboxError, Result};
use crate::mailbox::{MailboxId, MailboxInfo};
use crate::messaging::{Messaging, Wait};
use crate::sched::HALT_UNKNOWN_DEVICE;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Size of a device status word
pub const STATUS_SIZE: usize = std::mem::size_of::<i32>();

/// A registered device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    name: String,
    kind: DeviceKind,
    mailbox: MailboxId,
}

impl Device {
    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device class
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Mailbox completions are delivered to
    pub fn mailbox(&self) -> MailboxId {
        self.mailbox
    }
}

/// Devices and their mailboxes
pub struct DeviceTable {
    messaging: Arc<Messaging>,
    devices: Vec<Device>,
    /// Processes currently inside `wait_device`
    waiting: AtomicUsize,
    /// Clock interrupts seen so far
    ticks: AtomicU64,
    deliver_every: u64,
}

impl DeviceTable {
    /// Create one mailbox per configured device
    pub fn boot(
        messaging: Arc<Messaging>,
        config: &MessagingConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let mut devices = Vec::with_capacity(config.devices.len());

        for entry in &config.devices {
            let mailbox = messaging.create(entry.capacity(), STATUS_SIZE)?;
            debug!(
                "device {} ({:?}) on mailbox {}, capacity {}",
                entry.name,
                entry.kind,
                mailbox,
                entry.capacity()
            );
            devices.push(Device {
                name: entry.name.clone(),
                kind: entry.kind,
                mailbox,
            });
        }

        Ok(Self {
            messaging,
            devices,
            waiting: AtomicUsize::new(0),
            ticks: AtomicU64::new(0),
            deliver_every: u64::from(config.clock.deliver_every.max(1)),
        })
    }

    /// Registered devices in boot order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Look up a device by name
    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Block until the device reports a completion and return its status.
    ///
    /// An unknown device name halts the system.
    pub fn wait_device(&self, name: &str) -> Result<i32> {
        let mailbox = self.require(name);

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let mut status = [0u8; STATUS_SIZE];
        let received = self.messaging.receive(mailbox, &mut status, Wait::Blocking);
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        received?;
        Ok(i32::from_le_bytes(status))
    }

    /// Post a completion status from interrupt context.
    ///
    /// Never blocks. If nobody can take the status right now it is dropped and
    /// `WouldBlock` is returned.
    pub fn deliver(&self, name: &str, status: i32) -> Result<()> {
        let mailbox = self.require(name);

        match self.messaging.send(mailbox, &status.to_le_bytes(), Wait::NonBlocking) {
            Err(MailboxError::WouldBlock) => {
                warn!("{}: dropped status {}, nobody waiting", name, status);
                Err(MailboxError::WouldBlock)
            }
            result => result,
        }
    }

    /// Clock interrupt handler.
    ///
    /// Every `deliver_every`-th tick posts `now` to the clock device. Returns
    /// whether this tick was delivered.
    pub fn clock_interrupt(&self, now: i32) -> Result<bool> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if tick % self.deliver_every != 0 {
            return Ok(false);
        }

        let Some(clock) = self.devices.iter().find(|d| d.kind == DeviceKind::Clock) else {
            return Err(MailboxError::InvalidArgument("no clock device"));
        };

        trace!("clock tick {} delivering {}", tick, now);
        self.deliver(&clock.name, now).map(|()| true)
    }

    /// Clock interrupts seen so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Whether any process is waiting on a device
    pub fn io_pending(&self) -> bool {
        self.waiting.load(Ordering::SeqCst) > 0
    }

    /// Device names with a snapshot of their mailboxes
    pub fn status(&self) -> Vec<(&str, MailboxInfo)> {
        self.devices
            .iter()
            .filter_map(|d| Some((d.name.as_str(), self.messaging.info(d.mailbox)?)))
            .collect()
    }

    fn require(&self, name: &str) -> MailboxId {
        match self.get(name) {
            Some(device) => device.mailbox,
            None => {
                error!("unknown device {:?}", name);
                self.messaging.scheduler().halt(HALT_UNKNOWN_DEVICE)
            }
        }
    }
}
