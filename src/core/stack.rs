//! Task stack pool
//!
//! All task stacks live in one static pool. Regions are carved
//! downward from below a reserved kernel zone at the pool top; a task
//! keeps its region for the lifetime of its TCB, so the pool never
//! frees. The region type is the only holder of the raw bounds.

use crate::config::{CFG_KERNEL_STK_RESERVE, CFG_MAX_TASKS, CFG_TASK_STK_SIZE};
use crate::types::OsStkElement;

const POOL_WORDS: usize = CFG_MAX_TASKS * CFG_TASK_STK_SIZE + CFG_KERNEL_STK_RESERVE;

/// Backing memory for every task stack
static mut STACK_POOL_MEM: [OsStkElement; POOL_WORDS] = [0; POOL_WORDS];

/// One task's private stack region. `top` is one past the highest
/// usable word; stacks grow downward toward `base`.
#[derive(Clone, Copy)]
pub struct StackRegion {
    base: *mut OsStkElement,
    top: *mut OsStkElement,
}

impl StackRegion {
    #[inline]
    pub fn base(&self) -> *mut OsStkElement {
        self.base
    }

    #[inline]
    pub fn top(&self) -> *mut OsStkElement {
        self.top
    }

    #[inline]
    pub fn len(&self) -> usize {
        CFG_TASK_STK_SIZE
    }
}

/// Descending allocation cursor over the pool
pub(crate) struct StackPool {
    /// Word offset of the current allocation ceiling
    ceiling: usize,
}

impl StackPool {
    pub(crate) const fn new() -> Self {
        StackPool {
            ceiling: POOL_WORDS - CFG_KERNEL_STK_RESERVE,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.ceiling = POOL_WORDS - CFG_KERNEL_STK_RESERVE;
    }

    /// Carve the next task region below the ceiling. `None` when the
    /// pool cannot hold another full region.
    pub(crate) fn carve(&mut self) -> Option<StackRegion> {
        if self.ceiling < CFG_TASK_STK_SIZE {
            return None;
        }
        let base_off = self.ceiling - CFG_TASK_STK_SIZE;

        let mem = (&raw mut STACK_POOL_MEM) as *mut OsStkElement;
        let region = StackRegion {
            base: unsafe { mem.add(base_off) },
            top: unsafe { mem.add(self.ceiling) },
        };
        self.ceiling = base_off;
        Some(region)
    }
}
