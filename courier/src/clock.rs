//! Clock interrupt source
//!
//! Stands in for the hardware timer: a thread that raises a clock interrupt
//! every tick and reports the milliseconds elapsed since it started.

use libnyx_mbox::{ClockConfig, MailboxError, System};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Running clock interrupt thread
pub struct ClockSource {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl ClockSource {
    /// Start raising clock interrupts against `system`
    pub fn start(system: &'static System, config: ClockConfig) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let interval = Duration::from_millis(config.tick_interval_ms.max(1));

        let handle = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("clock-irq".into())
                .spawn(move || {
                    let started = Instant::now();
                    let mut dropped = 0u64;

                    while running.load(Ordering::Acquire) {
                        thread::sleep(interval);
                        let now = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

                        match system.devices().clock_interrupt(now) {
                            Ok(delivered) => {
                                trace!("clock interrupt at {}ms, delivered: {}", now, delivered)
                            }
                            Err(MailboxError::WouldBlock) => dropped += 1,
                            Err(e) => debug!("clock interrupt failed: {}", e),
                        }
                    }
                    dropped
                })?
        };

        debug!("clock source started, interval {:?}", interval);
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the interrupt thread. Returns the number of ticks nobody took.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.running.store(false, Ordering::Release);
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for ClockSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
