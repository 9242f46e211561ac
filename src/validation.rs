//! Reuse validation strategies.
//!
//! The pool consults its strategy at two points: when a claimed slot is
//! about to be handed out, and when a value comes back through its
//! release handle. A rejected value is disposed, never surfaced as an
//! error.

use std::time::Duration;

/// Decides whether a pooled value may still be used.
///
/// `idle` is the time since the value was last released or observed in
/// use, measured on the pool's clock. Strategies are free to ignore it
/// and probe the value instead.
pub trait ValidationStrategy<T>: Send + Sync {
    fn is_valid(&self, value: &T, idle: Duration) -> bool;
}

/// Adapter turning a closure into a strategy. See [`validate_fn`].
pub struct ValidateFn<F>(F);

/// Wrap an `Fn(&T, Duration) -> bool` closure as a [`ValidationStrategy`].
pub fn validate_fn<F>(probe: F) -> ValidateFn<F> {
    ValidateFn(probe)
}

impl<T, F> ValidationStrategy<T> for ValidateFn<F>
where
    F: Fn(&T, Duration) -> bool + Send + Sync,
{
    fn is_valid(&self, value: &T, idle: Duration) -> bool {
        (self.0)(value, idle)
    }
}

/// Accepts every value unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysValid;

impl<T> ValidationStrategy<T> for AlwaysValid {
    fn is_valid(&self, _value: &T, _idle: Duration) -> bool {
        true
    }
}

/// Rejects values that have sat idle longer than a fixed limit.
#[derive(Debug, Clone, Copy)]
pub struct MaxIdle {
    limit: Duration,
}

impl MaxIdle {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl<T> ValidationStrategy<T> for MaxIdle {
    fn is_valid(&self, _value: &T, idle: Duration) -> bool {
        idle <= self.limit
    }
}
