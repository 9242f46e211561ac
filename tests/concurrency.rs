//! Multi-threaded pool tests.
//!
//! These run against the real monotonic clock and verify the
//! cross-thread guarantees: the capacity bound, exactly-once disposal,
//! deadline behavior, and the release/close shutdown race.

#![cfg(not(feature = "loom"))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use threadcache::{Allocator, AlwaysValid, BoxError, Error, MonotonicClock, Pool, ReleaseHandle};

struct Conn {
    handle: ReleaseHandle<Conn>,
}

impl Conn {
    fn finish(self) {
        let handle = self.handle.clone();
        handle.release(self);
    }
}

#[derive(Default)]
struct ConnAllocator {
    created: AtomicUsize,
    disposed: AtomicUsize,
}

impl Allocator<Conn> for ConnAllocator {
    fn create(&self, handle: ReleaseHandle<Conn>) -> Result<Conn, BoxError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Conn { handle })
    }

    fn on_dispose(&self, value: Conn) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        drop(value);
    }
}

fn make_pool(capacity: usize) -> (Arc<Pool<Conn>>, Arc<ConnAllocator>) {
    let allocator = Arc::new(ConnAllocator::default());
    let pool = Arc::new(Pool::new(
        capacity,
        allocator.clone(),
        AlwaysValid,
        MonotonicClock::new(),
    ));
    (pool, allocator)
}

/// Track the high-water mark of concurrently held values.
#[derive(Default)]
struct HoldGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl HoldGauge {
    fn enter(&self) -> usize {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        now
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[test]
fn test_contended_acquire_never_overshoots_capacity() {
    let (pool, _allocator) = make_pool(2);
    let gauge = Arc::new(HoldGauge::default());
    let successes = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            let gauge = gauge.clone();
            let successes = successes.clone();
            thread::spawn(move || {
                if let Some(conn) = pool.acquire(Duration::from_millis(100)).unwrap() {
                    let held = gauge.enter();
                    assert!(held <= 2, "capacity overshoot: {} values held", held);
                    thread::sleep(Duration::from_millis(50));
                    gauge.exit();
                    conn.finish();
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    // Either the third worker timed out or a release freed a slot in
    // time; in both cases the bound held and someone made progress.
    assert!(gauge.max() <= 2);
    assert!(successes.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_stress_cycles_leak_nothing() {
    const THREADS: usize = 8;
    const CYCLES: usize = 200;
    const CAPACITY: usize = 4;

    let (pool, allocator) = make_pool(CAPACITY);
    let gauge = Arc::new(HoldGauge::default());

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = pool.clone();
            let gauge = gauge.clone();
            thread::spawn(move || {
                for _ in 0..CYCLES {
                    let conn = pool
                        .acquire(Duration::from_secs(5))
                        .unwrap()
                        .expect("acquire starved despite releases");
                    let held = gauge.enter();
                    assert!(held <= CAPACITY);
                    thread::yield_now();
                    gauge.exit();
                    conn.finish();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    pool.close();

    let created = allocator.created.load(Ordering::SeqCst);
    let disposed = allocator.disposed.load(Ordering::SeqCst);
    assert!(created <= CAPACITY, "more values than slots: {}", created);
    assert_eq!(created, disposed, "every created value is destroyed once");
    assert!(gauge.max() <= CAPACITY);
}

#[test]
fn test_close_wakes_blocked_acquirer() {
    let (pool, allocator) = make_pool(1);

    // Exhaust the pool so the waiter has to block.
    let held = pool.acquire(Duration::from_secs(1)).unwrap().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || {
            let start = Instant::now();
            let result = pool.acquire(Duration::from_secs(10));
            (result, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(50));
    pool.close();

    let (result, waited) = waiter.join().unwrap();
    assert!(matches!(result, Err(Error::Closed)));
    assert!(
        waited < Duration::from_secs(1),
        "waiter took {:?} to observe the closed flag",
        waited
    );

    // The held value is destroyed by its own release path.
    held.finish();
    assert_eq!(allocator.created.load(Ordering::SeqCst), 1);
    assert_eq!(allocator.disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_acquire_deadline_is_honored() {
    let (pool, _allocator) = make_pool(1);
    let held = pool.acquire(Duration::from_secs(1)).unwrap().unwrap();

    let start = Instant::now();
    let result = pool.acquire(Duration::from_millis(100)).unwrap();
    let waited = start.elapsed();

    assert!(result.is_none());
    assert!(waited >= Duration::from_millis(100));
    // Deadline plus polling granularity plus scheduling slack.
    assert!(waited < Duration::from_millis(600), "overslept: {:?}", waited);

    held.finish();
}

#[test]
fn test_release_racing_close_disposes_exactly_once() {
    // The loom model pins this exhaustively; here the race runs against
    // real threads for many rounds.
    for _ in 0..50 {
        let (pool, allocator) = make_pool(1);
        let conn = pool.acquire(Duration::from_secs(1)).unwrap().unwrap();

        let releaser = thread::spawn(move || conn.finish());
        let closer = {
            let pool = pool.clone();
            thread::spawn(move || pool.close())
        };

        releaser.join().unwrap();
        closer.join().unwrap();

        assert_eq!(allocator.created.load(Ordering::SeqCst), 1);
        assert_eq!(
            allocator.disposed.load(Ordering::SeqCst),
            1,
            "the releaser and the closer must retire the slot exactly once"
        );
    }
}
