//! Task Control Block (TCB) definition

use crate::types::{os_slot_prio, OsPrio, OsSlotId, OsStkElement, OsTaskFn, OsTaskState, OsTick};

/// Task Control Block
///
/// One record per permanent task identity. The queue position id is
/// assigned at creation and never changes; the queue itself is the
/// only holder of the task's effective scheduling position.
#[repr(C)]
pub struct OsTcb {
    /// Saved stack pointer; null until the first context save, which
    /// is how dispatch tells an unconsumed initial frame from a
    /// resumable one
    pub stk_ptr: *mut OsStkElement,
    /// Address of the initial CPU frame composed at activation
    pub stk_start: *mut OsStkElement,
    /// Lowest word of the task's private stack region
    pub stk_base: *mut OsStkElement,
    /// One past the highest word of the region
    pub stk_top: *mut OsStkElement,

    /// Permanent packed (priority, slot) position id
    pub slot_id: OsSlotId,
    /// Current lifecycle state
    pub status: OsTaskState,
    /// Remaining ticks until wake; meaningful only while suspended,
    /// zero when not sleeping on the tick timer
    pub delay: OsTick,

    /// Task entry point
    pub entry: Option<OsTaskFn>,
    /// Opaque argument handed to the entry on first dispatch
    pub arg: *mut (),
}

impl OsTcb {
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: core::ptr::null_mut(),
            stk_start: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_top: core::ptr::null_mut(),

            slot_id: 0,
            status: OsTaskState::Uncreated,
            delay: 0,

            entry: None,
            arg: core::ptr::null_mut(),
        }
    }

    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Nominal priority, recovered from the permanent position id
    #[inline]
    pub fn prio(&self) -> OsPrio {
        os_slot_prio(self.slot_id)
    }

    #[inline]
    pub fn is_uncreated(&self) -> bool {
        self.status == OsTaskState::Uncreated
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.status == OsTaskState::Suspended
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}
