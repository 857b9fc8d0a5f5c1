//! Freeing mailboxes with and without blocked processes

mod common;

use common::{messaging, wait_for_receivers, wait_for_senders};
use libnyx_mbox::{BlockReason, MailboxError, MailboxStatus, Scheduler, Status, Wait};
use std::sync::Arc;
use std::thread;

#[test]
fn free_releases_blocked_senders_and_receivers() {
    let (mb, sched) = messaging(8, 16, 16);
    let full = mb.create(1, 16).unwrap();
    let empty = mb.create(2, 16).unwrap();
    mb.send(full, b"queued", Wait::Blocking).unwrap();

    let mut blocked = Vec::new();
    for i in 0..3 {
        let mb_clone = Arc::clone(&mb);
        blocked.push(thread::spawn(move || {
            mb_clone.send(full, b"more", Wait::Blocking).map(|()| 0usize)
        }));
        wait_for_senders(&mb, full, i + 1);
    }
    for i in 0..2 {
        let mb_clone = Arc::clone(&mb);
        blocked.push(thread::spawn(move || {
            let mut buf = [0u8; 16];
            mb_clone.receive(empty, &mut buf, Wait::Blocking)
        }));
        wait_for_receivers(&mb, empty, i + 1);
    }

    mb.free(full).unwrap();
    mb.free(empty).unwrap();

    for waiter in blocked {
        let result = waiter.join().unwrap();
        assert_eq!(result, Err(MailboxError::Released));
        assert_eq!(result.unwrap_err().status(), Status::Released);
    }

    // The freeing process waited for everyone it released
    let me = sched.current_pid();
    assert_eq!(sched.blocks_of(me), vec![BlockReason::Release, BlockReason::Release]);
    assert_eq!(sched.unblocks.lock().len(), 5 + 2);

    assert_eq!(mb.free_slots(), 16);
    for id in [full, empty] {
        let mut buf = [0u8; 16];
        assert_eq!(mb.send(id, b"x", Wait::NonBlocking).unwrap_err().code(), -1);
        assert_eq!(mb.receive(id, &mut buf, Wait::NonBlocking).unwrap_err().code(), -1);
        assert_eq!(mb.free(id).unwrap_err().code(), -1);
        assert_eq!(mb.info(id).unwrap().status, MailboxStatus::Empty);
    }
}

#[test]
fn released_rendezvous_receiver() {
    let (mb, _) = messaging(4, 8, 16);
    let id = mb.create(0, 16).unwrap();

    let receiver = {
        let mb = Arc::clone(&mb);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            mb.receive(id, &mut buf, Wait::Blocking)
        })
    };
    wait_for_receivers(&mb, id, 1);

    assert_eq!(mb.free(id), Ok(()));
    assert_eq!(receiver.join().unwrap(), Err(MailboxError::Released));
}

#[test]
fn free_without_waiters_does_not_block() {
    let (mb, sched) = messaging(4, 8, 16);
    let id = mb.create(4, 16).unwrap();
    mb.send(id, b"a", Wait::NonBlocking).unwrap();
    mb.send(id, b"b", Wait::NonBlocking).unwrap();

    mb.free(id).unwrap();
    assert!(sched.blocks.lock().is_empty());
    assert_eq!(mb.free_slots(), 8);
    assert_eq!(mb.mailboxes_in_use(), 0);
}

#[test]
fn double_free_is_repeatably_invalid() {
    let (mb, _) = messaging(4, 8, 16);
    let id = mb.create(1, 16).unwrap();
    mb.free(id).unwrap();

    for _ in 0..5 {
        assert_eq!(mb.free(id), Err(MailboxError::NotInUse(id)));
    }
    for never_created in [2, 3] {
        assert_eq!(mb.free(never_created), Err(MailboxError::NotInUse(never_created)));
    }
    assert_eq!(mb.free(4), Err(MailboxError::InvalidHandle(4)));
}

#[test]
fn freed_entry_is_reused_by_create() {
    let (mb, _) = messaging(2, 8, 16);
    let a = mb.create(1, 16).unwrap();
    let b = mb.create(1, 16).unwrap();
    assert_eq!(mb.create(1, 16), Err(MailboxError::TableFull));

    mb.free(a).unwrap();
    let c = mb.create(0, 8).unwrap();
    assert_eq!(c, a);
    assert_eq!(mb.info(c).unwrap().capacity, 0);
    assert_eq!(mb.info(b).unwrap().status, MailboxStatus::InUse);
}
