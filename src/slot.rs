//! Slot state machine for pooled values.
//!
//! Every index in the pool's registry is backed by one [`Slot`], created
//! the first time the index is handed out and reused for the pool's
//! lifetime. The slot owns the parked value and the atomic state that
//! serializes all access to it.
//!
//! # State Transition Diagram
//!
//! ```text
//!            try_claim
//!   +-------------------------+
//!   |                         v
//! +-----------+   try_release   +---------+
//! | AVAILABLE |<----------------| CLAIMED |<--- slots start here
//! +-----------+                 +---------+
//!                                  |    ^
//!                      try_dispose |    | try_recycle
//!                                  v    |
//!                               +----------+
//!                               | DISPOSED |
//!                               +----------+
//! ```
//!
//! Each transition is a single compare-and-swap; a failed transition
//! means another thread moved the slot first and the caller must
//! re-examine the state. New slots start `CLAIMED` because the creating
//! thread owns the index until it hands the value out or releases.
//!
//! # Thread Safety
//!
//! The value cell is touched only by the thread that currently holds
//! the slot in `CLAIMED` (or by the single thread constructing it).
//! Claim ownership is handed over exclusively through the state CAS:
//! the AcqRel success ordering makes the previous holder's cell writes
//! visible to the next holder. `last_used` is written before the
//! release CAS so a claimer that wins the slot also observes the fresh
//! timestamp.

use std::cell::UnsafeCell;
use std::fmt;
use std::time::Duration;

use crate::sync::{AtomicU64, AtomicU8, Ordering};

/// State of a slot in its lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// Parked in the pool, value present, open to claimers.
    Available = 0,
    /// Owned by exactly one thread; value may be checked out.
    Claimed = 1,
    /// Value destroyed; index waiting on the disposed queue.
    Disposed = 2,
}

impl State {
    /// Convert from raw u8 value.
    ///
    /// # Panics
    /// Panics if the value is not a valid state (0-2).
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Available,
            1 => State::Claimed,
            2 => State::Disposed,
            _ => panic!("Invalid slot state value: {}", value),
        }
    }
}

/// One registry entry: pooled value plus its pooling metadata.
pub(crate) struct Slot<T> {
    /// Stable registry index, never changes after allocation.
    index: u32,
    /// Current [`State`], mutated only by CAS.
    state: AtomicU8,
    /// Clock reading of the most recent release or usage observation.
    last_used: AtomicU64,
    /// The parked value. `Some` whenever the slot is `AVAILABLE`; the
    /// claim holder takes it out for the duration of a checkout.
    value: UnsafeCell<Option<T>>,
}

// SAFETY: Slot is Send/Sync for T: Send because:
// 1. state and last_used are atomics
// 2. the value cell is only accessed by the thread holding the slot in
//    CLAIMED, and claim ownership transfers through the state CAS
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Slot<T> {
    /// Create a slot in `CLAIMED`, owned by the calling thread.
    pub(crate) fn new(index: u32, now: u64) -> Self {
        Self {
            index,
            state: AtomicU8::new(State::Claimed as u8),
            last_used: AtomicU64::new(now),
            value: UnsafeCell::new(None),
        }
    }

    #[inline]
    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub(crate) fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `AVAILABLE -> CLAIMED`. Winning this CAS grants exclusive
    /// ownership of the slot and its value cell.
    #[inline]
    pub(crate) fn try_claim(&self) -> bool {
        self.transition(State::Available, State::Claimed)
    }

    /// `CLAIMED -> AVAILABLE`. The timestamp is written before the
    /// state flips so any thread that claims the slot afterwards also
    /// observes the fresh timestamp.
    #[inline]
    pub(crate) fn try_release(&self, now: u64) -> bool {
        self.touch(now);
        self.transition(State::Claimed, State::Available)
    }

    /// `CLAIMED -> DISPOSED`.
    #[inline]
    pub(crate) fn try_dispose(&self) -> bool {
        self.transition(State::Claimed, State::Disposed)
    }

    /// `DISPOSED -> CLAIMED`, used by the thread that popped this
    /// slot's index from the disposed queue to install a fresh value.
    #[inline]
    pub(crate) fn try_recycle(&self) -> bool {
        self.transition(State::Disposed, State::Claimed)
    }

    /// Unconditionally stamp `last_used` with the current reading.
    #[inline]
    pub(crate) fn touch(&self, now: u64) {
        self.last_used.store(now, Ordering::Release);
    }

    /// Time since the slot's value was last used.
    #[inline]
    pub(crate) fn idle(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_used.load(Ordering::Acquire)))
    }

    /// Take the parked value out of the slot.
    ///
    /// Caller must hold the slot in `CLAIMED`.
    pub(crate) fn take_value(&self) -> T {
        // SAFETY: claim ownership serializes all access to the cell.
        match unsafe { (*self.value.get()).take() } {
            Some(value) => value,
            None => panic!("claimed slot {} holds no value", self.index),
        }
    }

    /// Park a value in the slot ahead of releasing it.
    ///
    /// Caller must hold the slot in `CLAIMED`.
    pub(crate) fn put_value(&self, value: T) {
        // SAFETY: claim ownership serializes all access to the cell.
        let previous = unsafe { (*self.value.get()).replace(value) };
        if previous.is_some() {
            panic!("slot {} already holds a value", self.index);
        }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("state", &self.state())
            .field("last_used", &self.last_used.load(Ordering::Relaxed))
            .finish()
    }
}
