//! Messaging configuration
//!
//! Table and pool sizes are fixed for the lifetime of the subsystem; they are
//! read once at boot and never change afterwards.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default number of mailbox table entries
pub const MAX_MAILBOXES: usize = 2000;

/// Default number of message slots shared by all mailboxes
pub const MAX_SLOTS: usize = 2500;

/// Default largest message in bytes
pub const MAX_MESSAGE: usize = 150;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Table and pool sizes
    #[serde(default)]
    pub limits: Limits,

    /// Clock interrupt settings
    #[serde(default)]
    pub clock: ClockConfig,

    /// Devices that get a dedicated mailbox at boot
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,
}

/// Fixed capacities of the subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Mailbox table entries
    #[serde(default = "default_max_mailboxes")]
    pub max_mailboxes: usize,

    /// Slots in the global pool
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,

    /// Largest payload any mailbox may accept
    #[serde(default = "default_max_message")]
    pub max_message: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_mailboxes: MAX_MAILBOXES,
            max_slots: MAX_SLOTS,
            max_message: MAX_MESSAGE,
        }
    }
}

/// Clock interrupt configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Interval between clock interrupts in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Deliver the clock status on every n-th interrupt
    #[serde(default = "default_deliver_every")]
    pub deliver_every: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            deliver_every: default_deliver_every(),
        }
    }
}

/// Device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Periodic clock; rendezvous mailbox
    Clock,
    /// Disk unit; slotted mailbox
    Disk,
    /// Terminal unit; slotted mailbox
    Terminal,
}

/// One device entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name used by `wait_device`
    pub name: String,

    /// Device class
    pub kind: DeviceKind,

    /// Mailbox capacity; ignored for the clock
    #[serde(default = "default_device_slots")]
    pub slots: usize,
}

impl DeviceConfig {
    /// Device entry with the default slot count
    pub fn new(name: &str, kind: DeviceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            slots: default_device_slots(),
        }
    }

    /// Capacity of this device's mailbox
    pub fn capacity(&self) -> usize {
        match self.kind {
            DeviceKind::Clock => 0,
            DeviceKind::Disk | DeviceKind::Terminal => self.slots,
        }
    }
}

// Default value functions
fn default_max_mailboxes() -> usize {
    MAX_MAILBOXES
}

fn default_max_slots() -> usize {
    MAX_SLOTS
}

fn default_max_message() -> usize {
    MAX_MESSAGE
}

fn default_tick_interval() -> u64 {
    20
}

fn default_deliver_every() -> u32 {
    5 // every 100ms at the default tick rate
}

fn default_device_slots() -> usize {
    10
}

fn default_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig::new("clock", DeviceKind::Clock),
        DeviceConfig::new("disk0", DeviceKind::Disk),
        DeviceConfig::new("disk1", DeviceKind::Disk),
        DeviceConfig::new("term0", DeviceKind::Terminal),
        DeviceConfig::new("term1", DeviceKind::Terminal),
        DeviceConfig::new("term2", DeviceKind::Terminal),
        DeviceConfig::new("term3", DeviceKind::Terminal),
    ]
}

impl MessagingConfig {
    /// Default configuration with the standard device set
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            clock: ClockConfig::default(),
            devices: default_devices(),
        }
    }

    /// Load configuration from file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content)
        } else {
            Ok(Self::new())
        }
    }

    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check limits and the device layout
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.max_mailboxes == 0 || limits.max_slots == 0 || limits.max_message == 0 {
            return Err(ConfigError::Invalid("limits must be non-zero".into()));
        }
        if self.clock.deliver_every == 0 {
            return Err(ConfigError::Invalid("clock.deliver_every must be non-zero".into()));
        }
        if self.devices.len() > limits.max_mailboxes {
            return Err(ConfigError::Invalid(format!(
                "{} devices do not fit in {} mailboxes",
                self.devices.len(),
                limits.max_mailboxes
            )));
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            if device.name.is_empty() {
                return Err(ConfigError::Invalid("device name is empty".into()));
            }
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate device {}", device.name)));
            }
            if device.capacity() > limits.max_slots {
                return Err(ConfigError::Invalid(format!(
                    "device {} wants {} slots, pool has {}",
                    device.name,
                    device.capacity(),
                    limits.max_slots
                )));
            }
        }

        let clocks = self
            .devices
            .iter()
            .filter(|d| d.kind == DeviceKind::Clock)
            .count();
        if clocks != 1 {
            return Err(ConfigError::Invalid(format!(
                "expected exactly one clock device, found {clocks}"
            )));
        }

        Ok(())
    }
}
