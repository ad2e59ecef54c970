//! Compile-time configuration
//!
//! These constants control the resource limits and timing of the kernel.

use crate::types::OsPrio;

/// Maximum number of task control blocks
pub const CFG_MAX_TASKS: usize = 16;

/// Number of priority classes (priority 0 is the most urgent)
pub const CFG_PRIO_MAX: usize = 8;

/// Intra-priority slots per class; must be a power of two so the
/// slot id packs as (prio << CFG_SLOT_BITS) | index
pub const CFG_SLOTS_PER_PRIO: usize = 8;

/// log2(CFG_SLOTS_PER_PRIO)
pub const CFG_SLOT_BITS: u8 = 3;

/// Maximum number of mutex slots
pub const CFG_MAX_MUTEX: usize = 16;

/// Task stack size in words (2 KiB)
pub const CFG_TASK_STK_SIZE: usize = 512;

/// Words kept free at the top of the stack pool for the kernel
pub const CFG_KERNEL_STK_RESERVE: usize = 128;

/// Core clock feeding the SysTick timer
pub const CFG_CPU_CLK_HZ: u32 = 16_000_000;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 100;

/// Priority of the initial (background) task created by `os_start`
pub const CFG_PRIO_BACKGROUND: OsPrio = (CFG_PRIO_MAX - 1) as OsPrio;

const _: () = assert!(CFG_SLOTS_PER_PRIO.is_power_of_two());
const _: () = assert!(CFG_PRIO_MAX <= 32);
