//! Courier - Messaging subsystem bring-up for DaemonOS
//!
//! Boots the mailbox subsystem, registers the device mailboxes, drives a
//! clock interrupt source and waits on the clock device.

mod clock;

use crate::clock::ClockSource;
use anyhow::{Context, Result};
use clap::Parser;
use libnyx_mbox::{HostScheduler, MessagingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Courier - Messaging subsystem bring-up
#[derive(Parser, Debug)]
#[command(name = "courierd", version, about)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/courier/courier.toml")]
    config: PathBuf,

    /// Number of clock device completions to wait for
    #[arg(short, long, default_value_t = 10)]
    ticks: u32,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .init();

    info!("Courier v{} starting", VERSION);

    // Load configuration
    let config = MessagingConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!("Configuration loaded from {:?}", args.config);

    let system = libnyx_mbox::boot(&config, Arc::new(HostScheduler::new()))?;
    let clock = ClockSource::start(system, config.clock)?;

    for tick in 1..=args.ticks {
        let status = system.devices().wait_device("clock")?;
        info!("clock completion {}/{}: status {}", tick, args.ticks, status);
    }

    let dropped = clock.stop();
    info!(
        "{} clock interrupts, {} undelivered",
        system.devices().ticks(),
        dropped
    );

    println!(
        "{:<8} {:>7} {:<10} {:>8} {:>8} {:>8}",
        "DEVICE", "MAILBOX", "KIND", "CAPACITY", "QUEUED", "WAITING"
    );
    for (name, mailbox) in system.devices().status() {
        println!(
            "{:<8} {:>7} {:<10} {:>8} {:>8} {:>8}",
            name,
            mailbox.id,
            format!("{:?}", mailbox.kind),
            mailbox.capacity,
            mailbox.occupied,
            mailbox.blocked_senders.len() + mailbox.blocked_receivers.len()
        );
    }
    println!("free slots: {}", system.messaging().free_slots());

    info!("Courier done");
    Ok(())
}
