//! Pool error types.

/// Boxed error produced by allocator callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Operational failures surfaced by the pool.
///
/// Acquisition timeout is not an error; `acquire` reports it as
/// `Ok(None)`. Invariant violations inside the pool panic instead of
/// returning a variant here, since they indicate state-machine
/// corruption rather than a recoverable condition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The pool has been closed; no further values can be acquired.
    #[error("pool has been closed, cannot acquire new values")]
    Closed,
    /// The allocator failed to construct a value. The slot index
    /// reserved for the value has already been returned to the
    /// disposed queue and remains reusable.
    #[error("allocator failed to create a value: {0}")]
    Allocate(#[source] BoxError),
}
