//! Error types and integer status codes
//!
//! Mailbox operations report three kinds of non-fatal outcome to their caller:
//! argument/state errors, capacity contention, and asynchronous release.
//! Each maps onto one of the integer codes handed across the process ABI.

use thiserror::Error;

/// Integer status codes returned by the process-facing operations.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Operation completed
    Ok = 0,
    /// Bad handle, wrong mailbox state, oversized message or undersized buffer
    Invalid = -1,
    /// Mailbox full or empty and the caller asked not to block
    WouldBlock = -2,
    /// Mailbox was freed while the caller was blocked on it
    Released = -5,
}

impl Status {
    /// Raw integer value of this status.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Mailbox operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// Handle does not name a slot in the mailbox table
    #[error("invalid mailbox handle {0}")]
    InvalidHandle(i64),

    /// Mailbox exists in the table but is not in use
    #[error("mailbox {0} is not in use")]
    NotInUse(usize),

    /// Payload exceeds the mailbox or global message limit
    #[error("message of {len} bytes exceeds limit of {limit}")]
    MessageTooLarge { len: usize, limit: usize },

    /// Receive buffer cannot hold the pending message
    #[error("buffer of {capacity} bytes cannot hold a {len} byte message")]
    BufferTooSmall { len: usize, capacity: usize },

    /// Malformed argument (negative size, missing buffer, bad capacity)
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// No mailbox table entry is free
    #[error("mailbox table is full")]
    TableFull,

    /// Operation cannot complete without blocking
    #[error("operation would block")]
    WouldBlock,

    /// Mailbox was released while the caller was blocked
    #[error("mailbox released while waiting")]
    Released,
}

impl MailboxError {
    /// Status code reported for this error across the ABI.
    pub const fn status(&self) -> Status {
        match self {
            Self::WouldBlock => Status::WouldBlock,
            Self::Released => Status::Released,
            Self::InvalidHandle(_)
            | Self::NotInUse(_)
            | Self::MessageTooLarge { .. }
            | Self::BufferTooSmall { .. }
            | Self::InvalidArgument(_)
            | Self::TableFull => Status::Invalid,
        }
    }

    /// Raw integer code for this error.
    pub const fn code(&self) -> i32 {
        self.status().code()
    }
}

/// Result type for mailbox operations
pub type Result<T> = std::result::Result<T, MailboxError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the configuration file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for this schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration parsed but violates a limit
    #[error("Validation error: {0}")]
    Invalid(String),

    /// A device mailbox could not be created at boot
    #[error("Boot error: {0}")]
    Boot(#[from] MailboxError),
}
