//! Logging macro shims
//!
//! Kernel code logs through these unconditionally; they forward to
//! `defmt` when the feature is enabled and evaluate to nothing
//! otherwise (arguments are still consumed, so builds without the
//! feature stay warning-free).

/// Debug message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

/// Info message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

/// Error message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

/// Trace message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}

// No-op versions when defmt is disabled

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! debug {
    ($($arg:expr),* $(,)?) => {{ $(let _ = &$arg;)* }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! info {
    ($($arg:expr),* $(,)?) => {{ $(let _ = &$arg;)* }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! error {
    ($($arg:expr),* $(,)?) => {{ $(let _ = &$arg;)* }};
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! trace {
    ($($arg:expr),* $(,)?) => {{ $(let _ = &$arg;)* }};
}
