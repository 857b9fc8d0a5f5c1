//! Device mailboxes, interrupt delivery and fatal misuse

mod common;

use common::{wait_for_receivers, wait_until, RecordingScheduler};
use libnyx_mbox::{
    ConfigError, DeviceKind, MailboxError, MailboxKind, MessagingConfig, System, Wait,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn system(deliver_every: u32) -> (System, Arc<RecordingScheduler>) {
    let mut config = MessagingConfig::new();
    config.limits.max_mailboxes = 32;
    config.limits.max_slots = 128;
    config.clock.tick_interval_ms = 1;
    config.clock.deliver_every = deliver_every;

    let sched = RecordingScheduler::new();
    let system = System::new(&config, sched.clone()).unwrap();
    (system, sched)
}

#[test]
fn boot_registers_default_devices() {
    let (system, _) = system(5);
    let devices = system.devices();

    let names: Vec<&str> = devices.devices().iter().map(|d| d.name()).collect();
    assert_eq!(names, ["clock", "disk0", "disk1", "term0", "term1", "term2", "term3"]);

    let clock = devices.get("clock").unwrap();
    assert_eq!(clock.kind(), DeviceKind::Clock);
    let info = system.messaging().info(clock.mailbox()).unwrap();
    assert_eq!(info.kind, MailboxKind::ZeroSlot);
    assert_eq!(info.max_message, 4);

    let disk = system.messaging().info(devices.get("disk0").unwrap().mailbox()).unwrap();
    assert_eq!(disk.capacity, 10);
    assert_eq!(system.messaging().mailboxes_in_use(), 7);
}

#[test]
fn interrupt_status_reaches_waiting_process() {
    let (system, _) = system(5);
    let system = Arc::new(system);
    assert!(!system.devices().io_pending());

    let waiter = {
        let system = Arc::clone(&system);
        thread::spawn(move || system.devices().wait_device("term1"))
    };
    wait_until("device waiter", || system.devices().io_pending());

    system.devices().deliver("term1", 0x1234).unwrap();
    assert_eq!(waiter.join().unwrap(), Ok(0x1234));
    assert!(!system.devices().io_pending());
}

#[test]
fn clock_delivers_on_divider() {
    let (system, _) = system(2);
    let system = Arc::new(system);
    let stop = Arc::new(AtomicBool::new(false));

    let clock = {
        let system = Arc::clone(&system);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut now = 0;
            while !stop.load(Ordering::SeqCst) {
                now += 1;
                let _ = system.devices().clock_interrupt(now);
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let mut last = 0;
    for _ in 0..3 {
        let status = system.devices().wait_device("clock").unwrap();
        assert_eq!(status % 2, 0, "clock delivered on an odd tick");
        assert!(status > last);
        last = status;
    }

    stop.store(true, Ordering::SeqCst);
    clock.join().unwrap();
    assert!(system.devices().ticks() >= 6);
}

#[test]
fn clock_tick_without_waiter_is_dropped() {
    let (system, _) = system(1);
    assert_eq!(
        system.devices().clock_interrupt(1),
        Err(MailboxError::WouldBlock)
    );
    let clock = system.devices().get("clock").unwrap().mailbox();
    assert_eq!(system.messaging().info(clock).unwrap().occupied, 0);
}

#[test]
fn freed_device_mailbox_releases_waiter() {
    let (system, _) = system(5);
    let system = Arc::new(system);
    let disk = system.devices().get("disk0").unwrap().mailbox();

    let waiter = {
        let system = Arc::clone(&system);
        thread::spawn(move || system.devices().wait_device("disk0"))
    };
    wait_for_receivers(system.messaging(), disk, 1);

    system.messaging().free(disk).unwrap();
    assert_eq!(waiter.join().unwrap(), Err(MailboxError::Released));
}

#[test]
#[should_panic(expected = "system halted with code -1")]
fn unknown_device_halts() {
    let (system, _) = system(5);
    let _ = system.devices().wait_device("tape0");
}

#[test]
#[should_panic(expected = "system halted with code 1")]
fn user_mode_call_halts() {
    let (system, sched) = system(5);
    sched.user_mode.store(true, Ordering::SeqCst);
    let _ = system.messaging().create(1, 8);
}

#[test]
fn pool_exhaustion_halts() {
    let (system, sched) = system(5);
    let messaging = Arc::clone(system.messaging());
    let first = messaging.create(100, 4).unwrap();
    let second = messaging.create(100, 4).unwrap();

    let filler = thread::spawn(move || {
        for i in 0..100u32 {
            messaging.send(first, &i.to_le_bytes(), Wait::NonBlocking).unwrap();
        }
        // 28 slots left in the pool
        for i in 0..29u32 {
            let _ = messaging.send(second, &i.to_le_bytes(), Wait::NonBlocking);
        }
    });

    assert!(filler.join().is_err());
    assert_eq!(*sched.halts.lock(), vec![1]);
}

#[test]
fn invalid_config_fails_boot() {
    let mut config = MessagingConfig::new();
    config.devices.clear();

    let result = System::new(&config, RecordingScheduler::new());
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn device_layout_larger_than_table_fails_boot() {
    let mut config = MessagingConfig::new();
    config.limits.max_mailboxes = 3;

    let result = System::new(&config, RecordingScheduler::new());
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
