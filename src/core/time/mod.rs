//! Time management
//!
//! The periodic tick drives preemption and delay expiry. The tick
//! handler itself only counts, flags, and requests a reschedule; the
//! delay bookkeeping runs inside the context switch when the flag is
//! consumed, so ticks landing while the scheduler is busy coalesce
//! into a single pass.

use crate::config::{CFG_MAX_TASKS, CFG_TICK_RATE_HZ};
use crate::critical::{critical_section, is_isr_context};
use crate::error::{os_fatal, Fault};
use crate::kernel;
use crate::kernel::KernelState;
use crate::sched;
use crate::types::{OsTaskId, OsTaskState, OsTick};

/// Periodic tick entry point, bound to the SysTick exception.
pub fn os_tick() {
    kernel::KERNEL.tick_increment();
    kernel::KERNEL.set_tick_event();
    sched::os_schedule();
}

/// Advance every armed delay counter by one tick.
///
/// Runs inside the context switch with interrupts masked. TCBs are
/// visited in ascending identity order; a counter reaching zero makes
/// its task eligible again at the task's own position slot, so a
/// woken task resumes at its original priority.
pub(crate) fn tick_bookkeeping(state: &mut KernelState) {
    let KernelState { tcbs, queue, .. } = state;

    for id in 0..CFG_MAX_TASKS {
        let tcb = &mut tcbs[id];
        if tcb.status == OsTaskState::Suspended && tcb.delay > 0 {
            tcb.delay -= 1;
            if tcb.delay == 0 {
                tcb.status = OsTaskState::Ready;
                queue.insert(tcb.slot_id, id as OsTaskId);
            }
        }
    }
}

/// Delay the calling task for `ticks` system ticks.
///
/// A zero delay returns immediately. The task sleeps until the tick
/// bookkeeping counts the delay down and re-queues it.
pub fn os_time_dly(ticks: OsTick) {
    if is_isr_context() {
        os_fatal(Fault::BlockFromIsr);
    }

    if ticks == 0 {
        return;
    }

    critical_section(|cs| {
        let state = kernel::KSTATE.get(cs);
        if let Some(cur) = state.current {
            state.tcbs[cur as usize].delay = ticks;
        }
        crate::task::os_task_sleep();
    });
}

/// Delay the calling task for (at least) `ms` milliseconds
pub fn os_time_dly_ms(ms: u32) {
    os_time_dly(ms.saturating_mul(CFG_TICK_RATE_HZ) / 1000);
}

/// Current tick count
#[inline]
pub fn os_time_get() -> OsTick {
    kernel::KERNEL.tick_get()
}

/// SysTick exception handler
#[cfg(target_arch = "arm")]
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick();
}
