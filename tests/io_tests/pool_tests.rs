//! Tests for HandlePool
//!
//! These tests verify:
//! - Lazy opening up to capacity
//! - LIFO reuse of returned handles
//! - Blocking borrow when exhausted
//! - Opener failures free their slot
//! - Close semantics for idle, lent out and waiting borrowers

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use strata::io::HandlePool;
use strata::StrataError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Pool of numbered handles; returns the pool and the open counter
fn counting_pool(capacity: usize) -> (HandlePool<usize>, Arc<AtomicUsize>) {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let pool = HandlePool::new(Path::new("/virtual/pool.db"), capacity, move || {
        Ok(counter.fetch_add(1, Ordering::SeqCst))
    });
    (pool, opened)
}

// =============================================================================
// Borrow / Return Tests
// =============================================================================

#[test]
fn test_opens_lazily() {
    let (pool, opened) = counting_pool(4);

    assert_eq!(opened.load(Ordering::SeqCst), 0);
    assert_eq!(pool.idle(), 0);
    assert_eq!(pool.capacity(), 4);

    let handle = pool.borrow().unwrap();
    assert_eq!(*handle, 0);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn test_reuses_most_recent_handle() {
    let (pool, opened) = counting_pool(4);

    let a = pool.borrow().unwrap();
    let b = pool.borrow().unwrap();
    assert_eq!((*a, *b), (0, 1));
    drop(a);
    drop(b);
    assert_eq!(pool.idle(), 2);

    // Last returned comes back first
    let c = pool.borrow().unwrap();
    assert_eq!(*c, 1);
    assert_eq!(opened.load(Ordering::SeqCst), 2);
}

#[test]
fn test_release_is_idempotent() {
    let (pool, _opened) = counting_pool(2);

    let mut guard = pool.borrow().unwrap();
    guard.release();
    guard.release();
    assert!(guard.is_released());
    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.idle(), 1);

    drop(guard);
    assert_eq!(pool.idle(), 1);
}

#[test]
#[should_panic(expected = "pooled handle used after release")]
fn test_deref_after_release_panics() {
    let (pool, _opened) = counting_pool(1);

    let mut guard = pool.borrow().unwrap();
    guard.release();
    let _value: usize = *guard;
}

#[test]
fn test_try_borrow_when_exhausted() {
    let (pool, _opened) = counting_pool(1);

    let held = pool.try_borrow().unwrap().unwrap();
    assert!(pool.try_borrow().unwrap().is_none());

    drop(held);
    assert!(pool.try_borrow().unwrap().is_some());
}

#[test]
fn test_borrow_blocks_until_return() {
    let (pool, opened) = counting_pool(2);

    let first = pool.borrow().unwrap();
    let second = pool.borrow().unwrap();

    let (tx, rx) = channel::unbounded();
    crossbeam::scope(|s| {
        s.spawn(|_| {
            let third = pool.borrow().unwrap();
            tx.send(*third).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(first);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
    })
    .unwrap();

    drop(second);
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn test_never_exceeds_capacity_under_contention() {
    let (pool, opened) = counting_pool(3);
    let peak = AtomicUsize::new(0);

    crossbeam::scope(|s| {
        for _ in 0..8 {
            s.spawn(|_| {
                for _ in 0..200 {
                    let _handle = pool.borrow().unwrap();
                    peak.fetch_max(pool.in_use(), Ordering::SeqCst);
                }
            });
        }
    })
    .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(opened.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn test_failed_open_frees_slot() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let pool = HandlePool::new(Path::new("/virtual/flaky.db"), 1, move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(StrataError::Config("first open fails".into()))
        } else {
            Ok(7u32)
        }
    });

    assert!(pool.borrow().is_err());
    assert_eq!(pool.in_use(), 0);
    assert_eq!(*pool.borrow().unwrap(), 7);
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_rejects_new_borrows() {
    let (pool, _opened) = counting_pool(2);
    drop(pool.borrow().unwrap());
    assert_eq!(pool.idle(), 1);

    pool.close();
    pool.close();

    assert!(pool.is_closed());
    assert_eq!(pool.idle(), 0);
    assert!(matches!(pool.borrow(), Err(StrataError::Closed { .. })));
    assert!(matches!(pool.try_borrow(), Err(StrataError::Closed { .. })));
}

#[test]
fn test_handle_returned_after_close_is_dropped() {
    let (pool, _opened) = counting_pool(2);

    let guard = pool.borrow().unwrap();
    pool.close();
    drop(guard);

    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.idle(), 0);
}

#[test]
fn test_close_wakes_waiting_borrowers() {
    let (pool, _opened) = counting_pool(1);
    let held = pool.borrow().unwrap();

    let (tx, rx) = channel::unbounded();
    crossbeam::scope(|s| {
        s.spawn(|_| {
            let result = pool.borrow();
            tx.send(matches!(result, Err(StrataError::Closed { .. })))
                .unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        pool.close();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    })
    .unwrap();

    drop(held);
}
