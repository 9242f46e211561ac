//! Allocator interface for pooled values.

use std::sync::Arc;

use crate::error::BoxError;
use crate::pool::ReleaseHandle;

/// Factory and lifecycle observer for pooled values.
///
/// The pool never constructs, destroys, or inspects values itself; it
/// delegates all three to the allocator. `create` receives the
/// [`ReleaseHandle`] that routes the value back to its slot, so the
/// allocator can embed the handle in whatever wrapper (session,
/// connection) it hands to the application.
pub trait Allocator<T>: Send + Sync {
    /// Produce a new value bound to `handle`.
    ///
    /// The handle must be invoked exactly once per checkout to return
    /// the value to the pool; a value that is never released is leaked
    /// from the pool's perspective, and a double release is a
    /// programmer error the pool reports by panicking.
    fn create(&self, handle: ReleaseHandle<T>) -> Result<T, BoxError>;

    /// Called as the pool hands a value to its claimer.
    fn on_acquire(&self, value: &T) {
        let _ = value;
    }

    /// Called exactly once as the pool destroys a value. The default
    /// simply drops it.
    fn on_dispose(&self, value: T) {
        drop(value);
    }
}

impl<T, A: Allocator<T>> Allocator<T> for Arc<A> {
    fn create(&self, handle: ReleaseHandle<T>) -> Result<T, BoxError> {
        (**self).create(handle)
    }

    fn on_acquire(&self, value: &T) {
        (**self).on_acquire(value)
    }

    fn on_dispose(&self, value: T) {
        (**self).on_dispose(value)
    }
}
