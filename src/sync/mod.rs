//! Synchronization primitives

#[cfg(feature = "mutex")]
pub mod mutex;
