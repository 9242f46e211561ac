//! threadcache: a bounded, thread-caching resource pool.
//!
//! This crate lends out expensive-to-create values (network
//! connections, sessions) to concurrent workers and recycles them on
//! release, without locks on the hot path and without any background
//! maintenance thread. All lifecycle transitions are driven by the
//! acquiring and releasing threads themselves.
//!
//! The building blocks:
//!
//! - **Slot**: per-index state machine owning one pooled value
//! - **Pool**: two-level claim path (thread-local cache, then the
//!   shared queues), lazy growth up to a fixed capacity, and the
//!   close protocol
//! - **Allocator**: external factory notified on acquire and dispose
//! - **ValidationStrategy**: pluggable predicate gating reuse
//! - **Clock**: monotonic millisecond source for timestamps and
//!   deadlines
//!
//! # Architecture
//!
//! ```text
//!   acquire(timeout)
//!        |
//!        v
//!   +-----------------+  miss   +------------+  empty  +-----------+
//!   | thread-local    |-------->| live queue |-------->| disposed  |
//!   | cached slot     |         | (hints)    |         | queue     |
//!   +-----------------+         +------------+         +-----------+
//!        | hit: try_claim            | try_claim            | recycle
//!        v                           v                      v
//!   validate ----------------> validate             allocator.create
//!        |                           |                      |
//!        +----------- value ---------+------- value --------+
//!                                                           |
//!                    (else: grow registry, or bounded wait) |
//! ```
//!
//! Released values re-enter through a release handle bound to their
//! slot at creation time; the releasing thread validates, re-publishes
//! to the live queue, and handles the race against a concurrent
//! `close`.
//!
//! # Example
//!
//! ```ignore
//! use threadcache::{Allocator, AlwaysValid, MonotonicClock, Pool, ReleaseHandle};
//!
//! struct Session {
//!     handle: ReleaseHandle<Session>,
//! }
//!
//! impl Session {
//!     fn finish(self) {
//!         let handle = self.handle.clone();
//!         handle.release(self);
//!     }
//! }
//!
//! struct SessionAllocator;
//!
//! impl Allocator<Session> for SessionAllocator {
//!     fn create(&self, handle: ReleaseHandle<Session>) -> Result<Session, threadcache::BoxError> {
//!         Ok(Session { handle })
//!     }
//! }
//!
//! let pool = Pool::new(8, SessionAllocator, AlwaysValid, MonotonicClock::new());
//! let session = pool.acquire(std::time::Duration::from_secs(1))?.expect("timed out");
//! // ... use the session ...
//! session.finish();
//! pool.close();
//! ```

mod allocator;
mod clock;
mod error;
pub mod metrics;
mod pool;
mod slot;
pub(crate) mod sync;
mod validation;

pub use allocator::Allocator;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{BoxError, Error};
pub use pool::{Pool, ReleaseHandle};
pub use validation::{validate_fn, AlwaysValid, MaxIdle, ValidateFn, ValidationStrategy};
