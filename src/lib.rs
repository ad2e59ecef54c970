//! A small preemptive real-time multitasking kernel in Rust
//!
//! The kernel provides:
//! - Fixed-priority preemptive scheduling, round-robin inside each
//!   priority class
//! - Re-entrant mutexes with swap-based priority inheritance
//! - Tick-driven task delays
//! - Context switching for ARM Cortex-M, with a host stub for testing

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;

// ============ Re-exports ============

pub use self::core::config;
pub use self::core::config::*;
pub use self::core::critical;
pub use self::core::error;
pub use self::core::error::{Fault, KernelResult};
pub use self::core::kernel;
pub use self::core::kernel::{os_current, os_exit, os_init, os_is_running, os_set_trace_hook, os_start};
pub use self::core::prio;
pub use self::core::stack;
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::task;
pub use self::core::task::{
    os_task_activate, os_task_create, os_task_end, os_task_location, os_task_sleep,
    os_task_status, os_task_wake,
};
pub use self::core::sched;
pub use self::core::sched::{os_context_switch, os_schedule, ReadyQueue};
pub use self::core::time;
pub use self::core::time::{os_tick, os_time_dly, os_time_dly_ms, os_time_get};

#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "mutex")]
pub use sync::mutex::{
    os_mutex_acquire, os_mutex_create, os_mutex_destroy, os_mutex_init, os_mutex_nesting,
    os_mutex_owner, os_mutex_release, os_mutex_state, os_mutex_waiters,
};
