//! Port layer - CPU-specific implementations
//!
//! Everything the kernel needs from the hardware: the periodic tick
//! source, the reschedule trap, and the initial stack frame layout.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

// Stub implementations for non-ARM targets (host testing)
#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use crate::types::{OsStkElement, OsTaskFn};

    pub fn os_systick_init(_cnts: u32) {}

    pub fn os_trap_init() {}

    /// On the host nothing delivers the trap; tests drive the switch
    /// routine directly.
    pub fn os_schedule_trap() {}

    /// # Safety
    /// `stk_top` must be the top of a valid region; nothing is
    /// written on the host.
    pub unsafe fn os_task_stk_init(
        _entry: OsTaskFn,
        _arg: *mut (),
        stk_top: *mut OsStkElement,
    ) -> *mut OsStkElement {
        ((stk_top as usize) & !7) as *mut OsStkElement
    }
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
