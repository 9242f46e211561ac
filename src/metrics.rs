//! Pool metrics.

use metriken::{metric, Counter, Gauge};

#[metric(
    name = "pool_acquire",
    description = "Total values successfully handed out"
)]
pub static ACQUIRE: Counter = Counter::new();

#[metric(
    name = "pool_acquire_local",
    description = "Acquisitions served by the thread-local fast path"
)]
pub static ACQUIRE_LOCAL: Counter = Counter::new();

#[metric(
    name = "pool_acquire_timeout",
    description = "Acquisitions that reached their deadline empty-handed"
)]
pub static ACQUIRE_TIMEOUT: Counter = Counter::new();

#[metric(
    name = "pool_allocate",
    description = "Values created by the allocator"
)]
pub static ALLOCATE: Counter = Counter::new();

#[metric(
    name = "pool_allocate_failed",
    description = "Allocator create calls that returned an error"
)]
pub static ALLOCATE_FAILED: Counter = Counter::new();

#[metric(
    name = "pool_recycle",
    description = "Disposed slots re-armed with a fresh value"
)]
pub static RECYCLE: Counter = Counter::new();

#[metric(
    name = "pool_release",
    description = "Values returned to the pool by their release handle"
)]
pub static RELEASE: Counter = Counter::new();

#[metric(
    name = "pool_dispose",
    description = "Values destroyed by the pool"
)]
pub static DISPOSE: Counter = Counter::new();

#[metric(
    name = "pool_slots",
    description = "Slots allocated in the registry (high-water mark)"
)]
pub static SLOTS: Gauge = Gauge::new();
