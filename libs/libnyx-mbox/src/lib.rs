//! # libnyx-mbox - Nyx Mailbox Messaging
//!
//! Bounded and rendezvous message queues for kernel processes and interrupt
//! handlers.
//!
//! ## Features
//!
//! - **Mailboxes** - FIFO channels of fixed-maximum-size byte messages
//! - **Slot pool** - one fixed arena of message buffers shared by all mailboxes
//! - **Rendezvous** - capacity-0 mailboxes hand messages directly between processes
//! - **Release** - freeing a mailbox wakes its blocked processes with a distinct status
//! - **Devices** - per-device mailboxes fed by interrupt handlers
//!
//! ## Quick Start
//!
//! ```
//! use libnyx_mbox::{HostScheduler, Limits, Messaging, Wait};
//! use std::sync::Arc;
//!
//! let mb = Messaging::new(Limits::default(), Arc::new(HostScheduler::new()));
//! let id = mb.create(5, 50)?;
//!
//! mb.send(id, b"hello there", Wait::Blocking)?;
//!
//! let mut buf = [0u8; 80];
//! let len = mb.receive(id, &mut buf, Wait::Blocking)?;
//! assert_eq!(&buf[..len], b"hello there");
//! # Ok::<(), libnyx_mbox::MailboxError>(())
//! ```
//!
//! Processes that speak integer status codes go through [`abi`] after
//! [`boot`] has set up the process-wide instance.

pub mod abi;
pub mod config;
pub mod device;
pub mod error;
pub mod mailbox;
pub mod messaging;
pub mod sched;
pub mod slot;
pub mod wait;

pub use abi::{boot, system, System};
pub use config::{ClockConfig, DeviceConfig, DeviceKind, Limits, MessagingConfig};
pub use device::{Device, DeviceTable};
pub use error::{ConfigError, MailboxError, Result, Status};
pub use mailbox::{MailboxId, MailboxInfo, MailboxKind, MailboxStatus};
pub use messaging::{Messaging, Wait};
pub use sched::{BlockReason, HostScheduler, ProcessId, Scheduler};
