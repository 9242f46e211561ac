//! Atomic primitives with optional loom support.
//!
//! Production builds use std atomics; enabling the `loom` feature swaps
//! in loom's model-checked equivalents so the state-machine protocols
//! can be exercised under exhaustive interleaving.

#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

#[cfg(feature = "loom")]
pub use loom::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
