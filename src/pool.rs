//! Thread-caching resource pool.
//!
//! [`Pool`] lends out expensive-to-create values (connections,
//! sessions) and recycles them on release. There is no background
//! maintenance thread; every lifecycle transition is driven by the
//! threads calling [`Pool::acquire`], the release handles, or
//! [`Pool::close`].
//!
//! # Acquire priority order
//!
//! 1. The slot this thread released last (thread-local, zero
//!    contention).
//! 2. A hint from the live queue, re-verified with `try_claim`.
//! 3. A disposed slot, re-armed with a freshly created value.
//! 4. Registry growth, up to the fixed capacity.
//! 5. A bounded wait on the live queue (at most 10ms per round) until
//!    the deadline runs out.
//!
//! # Thread Safety
//!
//! Slot state CASes carry all value hand-offs (see [`crate::slot`]).
//! The one cross-variable race is release-vs-close: a releaser
//! publishes `AVAILABLE` and then re-checks the closed flag, while the
//! closer sets the flag and then scans the registry. Both sides put a
//! `SeqCst` fence between their write and their read, which forbids the
//! store-buffering outcome where each misses the other; exactly one of
//! them retires the slot.

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use crossbeam_deque::{Injector, Steal};
use thread_local::ThreadLocal;

use crate::allocator::Allocator;
use crate::clock::Clock;
use crate::error::Error;
use crate::metrics;
use crate::slot::Slot;
use crate::sync::{fence, AtomicBool, AtomicU32, Ordering};
use crate::validation::ValidationStrategy;

/// Upper bound on a single live-queue wait. Keeps blocked acquirers
/// re-checking the closed flag and the disposed queue, which has no
/// wakeup signal of its own.
const LIVE_POLL_MILLIS: u64 = 10;

/// Sentinel for "no cached slot" in the thread-local cache.
const NO_SLOT: u32 = u32::MAX;

/// A bounded pool of reusable values.
///
/// Values are created lazily through the [`Allocator`], capped at the
/// configured capacity, validated before reuse, and destroyed exactly
/// once. Dropping the pool closes it.
pub struct Pool<T> {
    inner: Arc<PoolInner<T>>,
}

struct PoolInner<T> {
    /// All slots ever created, indexed densely up to the high-water
    /// mark. Used to find claimable slots at close time.
    registry: Box<[OnceLock<Slot<T>>]>,
    /// Slots that are likely (but not guaranteed) to be AVAILABLE.
    live_tx: Sender<u32>,
    live_rx: Receiver<u32>,
    /// Slots whose value has been destroyed, awaiting re-allocation.
    disposed: Injector<u32>,
    /// Per-thread cache of the last slot this thread released.
    local: ThreadLocal<Cell<u32>>,
    /// High-water mark; monotonic, counts slots ever created.
    next_index: AtomicU32,
    /// Shutdown flag.
    closed: AtomicBool,
    allocator: Box<dyn Allocator<T>>,
    validation: Box<dyn ValidationStrategy<T>>,
    clock: Box<dyn Clock>,
    /// Self-reference handed to release handles.
    weak: Weak<PoolInner<T>>,
}

/// Routes a checked-out value back to its slot.
///
/// Handed to [`Allocator::create`] so the wrapper resource can embed
/// it; [`ReleaseHandle::release`] must be called exactly once per
/// checkout. Holds only a weak pool reference, so parked values do not
/// keep the pool alive.
pub struct ReleaseHandle<T> {
    pool: Weak<PoolInner<T>>,
    index: u32,
}

impl<T> Clone for ReleaseHandle<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            index: self.index,
        }
    }
}

impl<T> fmt::Debug for ReleaseHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("index", &self.index)
            .finish()
    }
}

impl<T> ReleaseHandle<T> {
    /// Index of the slot this handle returns values to.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Return a value to the pool.
    ///
    /// Must be invoked exactly once per acquisition. The pool
    /// re-validates the value and either parks it for reuse or
    /// destroys it. If the pool has been dropped the value is dropped
    /// in place.
    ///
    /// # Panics
    /// Panics if the slot is not claimed, which means the handle was
    /// invoked twice for one checkout.
    pub fn release(&self, value: T) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(self.index, value);
        }
    }
}

impl<T> Pool<T> {
    /// Create a pool that lends out at most `capacity` values.
    ///
    /// No value is created up front; slots are allocated as demand
    /// grows.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or does not fit a slot index.
    pub fn new(
        capacity: usize,
        allocator: impl Allocator<T> + 'static,
        validation: impl ValidationStrategy<T> + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        assert!(capacity > 0, "pool capacity must be non-zero");
        assert!(
            capacity < NO_SLOT as usize,
            "pool capacity must fit a slot index"
        );

        let (live_tx, live_rx) = crossbeam_channel::unbounded();
        let inner = Arc::new_cyclic(|weak| PoolInner {
            registry: (0..capacity).map(|_| OnceLock::new()).collect(),
            live_tx,
            live_rx,
            disposed: Injector::new(),
            local: ThreadLocal::new(),
            next_index: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            allocator: Box::new(allocator),
            validation: Box::new(validation),
            clock: Box::new(clock),
            weak: weak.clone(),
        });
        Self { inner }
    }

    /// Claim a value, waiting up to `timeout` for one to free up.
    ///
    /// Returns `Ok(None)` when the deadline passes with nothing to
    /// hand out. Fails with [`Error::Closed`] once the pool has been
    /// closed and with [`Error::Allocate`] when the allocator cannot
    /// produce a value.
    pub fn acquire(&self, timeout: Duration) -> Result<Option<T>, Error> {
        let inner = &*self.inner;
        let deadline = inner
            .clock
            .millis()
            .saturating_add(timeout.as_millis() as u64);

        // 1. Try the slot this thread released last.
        let cached = inner.local.get_or(|| Cell::new(NO_SLOT));
        let hint = cached.get();
        if hint != NO_SLOT {
            let slot = inner.slot(hint);
            if slot.try_claim() {
                if let Some(value) = inner.take_if_valid(slot) {
                    metrics::ACQUIRE.increment();
                    metrics::ACQUIRE_LOCAL.increment();
                    inner.allocator.on_acquire(&value);
                    return Ok(Some(value));
                }
                // Validation retired the cached slot. The stale cache
                // entry stays; a successful global acquire overwrites
                // it.
            }
        }

        // 2. Fall back to the shared structures.
        match inner.acquire_global(deadline)? {
            Some((index, value)) => {
                cached.set(index);
                metrics::ACQUIRE.increment();
                inner.allocator.on_acquire(&value);
                Ok(Some(value))
            }
            None => {
                metrics::ACQUIRE_TIMEOUT.increment();
                Ok(None)
            }
        }
    }

    /// Close the pool, destroying every value it can claim.
    ///
    /// Idempotent; only the first caller runs the registry scan. Values
    /// currently checked out are destroyed by their own release path,
    /// which re-checks the closed flag. After `close` returns, every
    /// `acquire` fails fast with [`Error::Closed`].
    pub fn close(&self) {
        self.inner.close();
    }

    /// Configured upper bound on concurrently existing values.
    pub fn capacity(&self) -> usize {
        self.inner.registry.len()
    }

    /// Number of slots ever created (the high-water mark).
    pub fn allocated(&self) -> usize {
        self.inner.next_index.load(Ordering::Relaxed) as usize
    }

    /// Whether `close` has begun.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("allocated", &self.allocated())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl<T> PoolInner<T> {
    /// Look up an allocated slot. The registry is written once per
    /// index before that index circulates, so a miss is state-machine
    /// corruption.
    fn slot(&self, index: u32) -> &Slot<T> {
        match self.registry[index as usize].get() {
            Some(slot) => slot,
            None => panic!("slot {} is not allocated", index),
        }
    }

    /// The global half of the acquire path: live-queue hints, disposed
    /// recycling, growth, then a bounded wait, repeated until the
    /// deadline.
    fn acquire_global(&self, deadline: u64) -> Result<Option<(u32, T)>, Error> {
        let mut hint = self.live_rx.try_recv().ok();

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Closed);
            }

            match hint.take() {
                Some(index) => {
                    let slot = self.slot(index);
                    if slot.try_claim() {
                        if let Some(value) = self.take_if_valid(slot) {
                            return Ok(Some((index, value)));
                        }
                    }
                    // Stale hint (another claimer won) or the value was
                    // retired by validation. Fall through to the wait.
                }
                None => {
                    // No live hint: recycle a disposed slot, or grow.
                    if let Some(index) = self.steal_disposed() {
                        return self.reallocate(index).map(|value| Some((index, value)));
                    }
                    if let Some(index) = self.try_grow() {
                        return self.allocate(index).map(|value| Some((index, value)));
                    }
                }
            }

            let now = self.clock.millis();
            if now >= deadline {
                return Ok(None);
            }
            // The cap bounds how long a waiter can miss the closed flag
            // or a freshly disposed slot.
            let wait = (deadline - now).min(LIVE_POLL_MILLIS);
            hint = self.live_rx.recv_timeout(Duration::from_millis(wait)).ok();
        }
    }

    /// Validate a freshly claimed slot and move its value out. On
    /// rejection the slot is disposed and the search continues.
    fn take_if_valid(&self, slot: &Slot<T>) -> Option<T> {
        let value = slot.take_value();
        let idle = slot.idle(self.clock.millis());
        if self.validation.is_valid(&value, idle) {
            Some(value)
        } else {
            self.dispose(slot, value);
            None
        }
    }

    fn steal_disposed(&self) -> Option<u32> {
        loop {
            match self.disposed.steal() {
                Steal::Success(index) => return Some(index),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }

    /// Claim the next registry index if the pool is below capacity.
    /// The counter is monotonic; freed indices come back through the
    /// disposed queue instead.
    fn try_grow(&self) -> Option<u32> {
        let capacity = self.registry.len() as u32;
        let mut index = self.next_index.load(Ordering::Relaxed);
        loop {
            if index >= capacity {
                return None;
            }
            match self.next_index.compare_exchange(
                index,
                index + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(index),
                Err(current) => index = current,
            }
        }
    }

    /// Create the slot for a freshly grown index and install a value.
    fn allocate(&self, index: u32) -> Result<T, Error> {
        let slot = Slot::new(index, self.clock.millis());
        if self.registry[index as usize].set(slot).is_err() {
            panic!("slot {} initialized twice", index);
        }
        metrics::SLOTS.increment();
        self.install(self.slot(index), index)
    }

    /// Re-arm a slot pulled from the disposed queue with a new value.
    fn reallocate(&self, index: u32) -> Result<T, Error> {
        let slot = self.slot(index);
        if !slot.try_recycle() {
            panic!("slot {} from the disposed queue was not disposed", index);
        }
        metrics::RECYCLE.increment();
        self.install(slot, index)
    }

    /// Ask the allocator for a value for a claimed slot. On failure the
    /// slot goes back on the disposed queue so the index stays
    /// reusable; the growth counter is never rolled back.
    fn install(&self, slot: &Slot<T>, index: u32) -> Result<T, Error> {
        let handle = ReleaseHandle {
            pool: self.weak.clone(),
            index,
        };
        match self.allocator.create(handle) {
            Ok(value) => {
                slot.touch(self.clock.millis());
                metrics::ALLOCATE.increment();
                Ok(value)
            }
            Err(source) => {
                if !slot.try_dispose() {
                    panic!("slot {} changed state during a failed allocation", index);
                }
                self.disposed.push(index);
                metrics::ALLOCATE_FAILED.increment();
                Err(Error::Allocate(source))
            }
        }
    }

    /// Accept a value back from its release handle.
    fn release(&self, index: u32, value: T) {
        let slot = self.slot(index);
        slot.touch(self.clock.millis());

        // The value may have gone bad while checked out (a connection
        // that saw a fatal error). Retire it instead of re-publishing.
        let idle = slot.idle(self.clock.millis());
        if !self.validation.is_valid(&value, idle) {
            self.dispose(slot, value);
            return;
        }

        slot.put_value(value);
        if !slot.try_release(self.clock.millis()) {
            panic!("released slot {} was not claimed", index);
        }
        metrics::RELEASE.increment();

        // Publish-then-re-check: the closed flag is read only after the
        // slot went AVAILABLE. Paired with the fence in close(), this
        // guarantees exactly one of releaser and closer retires the
        // slot.
        fence(Ordering::SeqCst);
        if !self.closed.load(Ordering::SeqCst) {
            let _ = self.live_tx.send(index);
        } else if slot.try_claim() {
            // The closer scanned before we published AVAILABLE and will
            // not come back; reclaim the slot and retire it ourselves.
            // Losing this claim means another thread owns the slot now.
            let value = slot.take_value();
            self.dispose(slot, value);
        }
    }

    /// Retire a claimed slot. The index is queued for re-allocation
    /// before the allocator hook runs, so a panicking hook cannot
    /// strand the index.
    fn dispose(&self, slot: &Slot<T>, value: T) {
        if !slot.try_dispose() {
            panic!("cannot dispose slot {} that is not claimed", slot.index());
        }
        self.disposed.push(slot.index());
        metrics::DISPOSE.increment();
        self.allocator.on_dispose(value);
    }

    fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        fence(Ordering::SeqCst);

        for cell in self.registry.iter() {
            let Some(slot) = cell.get() else { continue };
            if slot.try_claim() {
                let value = slot.take_value();
                self.dispose(slot, value);
            }
            // CLAIMED slots are retired by their releaser through the
            // shutdown re-check; DISPOSED slots are already done.
        }
    }
}
