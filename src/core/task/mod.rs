//! Task management
//!
//! Creation, activation, voluntary suspension, wake, and the end-of-
//! task trampoline. A task's identity is its permanent TCB index; its
//! queue position id is assigned once at creation and encodes the
//! nominal priority for the task's whole life.

mod tcb;

pub use tcb::OsTcb;

use crate::config::{CFG_MAX_TASKS, CFG_PRIO_MAX, CFG_SLOTS_PER_PRIO};
use crate::critical::{critical_section, is_isr_context};
use crate::error::{os_fatal, Fault};
use crate::kernel;
use crate::sched;
use crate::types::{os_slot_id, OsPrio, OsSlotId, OsTaskFn, OsTaskId, OsTaskState};

/// Create a new task
///
/// Reserves the lowest free TCB, the first free position slot at the
/// requested priority, and a private stack region, then records the
/// entry point and argument. The task is left dormant until
/// [`os_task_activate`].
///
/// Fatal on TCB or slot exhaustion, an out-of-range priority, or an
/// exhausted stack pool.
pub fn os_task_create(entry: OsTaskFn, prio: OsPrio, arg: *mut ()) -> OsTaskId {
    if (prio as usize) >= CFG_PRIO_MAX {
        os_fatal(Fault::PrioInvalid);
    }

    critical_section(|cs| {
        let state = kernel::KSTATE.get(cs);

        let Some(id) = state.tcbs.iter().position(|t| t.is_uncreated()) else {
            os_fatal(Fault::TcbExhausted);
        };

        let used = &mut state.slot_used[prio as usize];
        let Some(index) = (0..CFG_SLOTS_PER_PRIO as u8).find(|i| *used & (1 << i) == 0) else {
            os_fatal(Fault::SlotExhausted);
        };
        *used |= 1 << index;

        let Some(region) = state.stacks.carve() else {
            os_fatal(Fault::StackExhausted);
        };

        let tcb = &mut state.tcbs[id];
        tcb.init();
        tcb.slot_id = os_slot_id(prio, index);
        tcb.stk_base = region.base();
        tcb.stk_top = region.top();
        tcb.entry = Some(entry);
        tcb.arg = arg;
        tcb.status = OsTaskState::Created;

        id as OsTaskId
    })
}

/// Make a created task eligible
///
/// Composes the initial CPU frame at the top of the task's stack so
/// the first dispatch runs `entry(arg)` and returns into
/// [`os_task_end`], inserts the task at its position slot, and
/// requests a reschedule. Fatal on an uncreated task; no effect in
/// any state other than created.
pub fn os_task_activate(id: OsTaskId) {
    if (id as usize) >= CFG_MAX_TASKS {
        os_fatal(Fault::ActivateUncreated);
    }

    critical_section(|cs| {
        let state = kernel::KSTATE.get(cs);
        let tcb = &mut state.tcbs[id as usize];

        match tcb.status {
            OsTaskState::Uncreated => os_fatal(Fault::ActivateUncreated),
            OsTaskState::Created => {
                let Some(entry) = tcb.entry else {
                    os_fatal(Fault::ActivateUncreated);
                };
                tcb.stk_start = unsafe { crate::port::os_task_stk_init(entry, tcb.arg, tcb.stk_top) };
                tcb.stk_ptr = core::ptr::null_mut();
                tcb.status = OsTaskState::Ready;

                let slot = tcb.slot_id;
                state.queue.insert(slot, id);
                sched::os_schedule();
            }
            _ => {}
        }
    });
}

/// End-of-task trampoline
///
/// Every initial frame carries this function as the return address, so
/// a task that returns is retired here: back to the created state, off
/// the ready queue, reschedule. Re-activation rebuilds a fresh frame.
pub extern "C" fn os_task_end() {
    critical_section(|cs| {
        let state = kernel::KSTATE.get(cs);
        if let Some(cur) = state.current {
            let tcb = &mut state.tcbs[cur as usize];
            tcb.status = OsTaskState::Created;
            tcb.stk_ptr = core::ptr::null_mut();
            tcb.delay = 0;

            if let Some(loc) = state.queue.location_of(cur) {
                state.queue.remove(loc);
            }
            sched::os_schedule();
        }
    });

    // The pended reschedule fires as soon as the section above closes
    // and this context is never elected again.
    #[cfg(target_arch = "arm")]
    loop {
        cortex_m::asm::wfi();
    }
}

/// Suspend the calling task until another task wakes it
pub fn os_task_sleep() {
    if is_isr_context() {
        os_fatal(Fault::BlockFromIsr);
    }

    critical_section(|cs| {
        let state = kernel::KSTATE.get(cs);
        if let Some(cur) = state.current {
            state.tcbs[cur as usize].status = OsTaskState::Suspended;

            // Remove at the current location: a lock holder may be
            // sitting in a transplanted slot
            if let Some(loc) = state.queue.location_of(cur) {
                state.queue.remove(loc);
            }
            sched::os_schedule();
        }
    });
}

/// Wake a suspended task
///
/// The task re-enters the queue at its permanent position slot, i.e.
/// at its original priority. Wake signals are not memorised: waking a
/// task that is already eligible only requests a reschedule. Fatal on
/// an uncreated task.
pub fn os_task_wake(id: OsTaskId) {
    if (id as usize) >= CFG_MAX_TASKS {
        os_fatal(Fault::WakeUncreated);
    }

    critical_section(|cs| {
        let state = kernel::KSTATE.get(cs);
        let tcb = &mut state.tcbs[id as usize];

        if tcb.is_uncreated() {
            os_fatal(Fault::WakeUncreated);
        }

        if tcb.is_suspended() {
            tcb.status = OsTaskState::Ready;
            tcb.delay = 0;
            let slot = tcb.slot_id;
            state.queue.insert(slot, id);
        }
        sched::os_schedule();
    });
}

/// Current lifecycle state of a task
pub fn os_task_status(id: OsTaskId) -> OsTaskState {
    if (id as usize) >= CFG_MAX_TASKS {
        return OsTaskState::Uncreated;
    }
    critical_section(|cs| kernel::KSTATE.get(cs).tcbs[id as usize].status)
}

/// Current ready-queue position of a task, if it is queued.
///
/// Differs from the task's permanent slot exactly while the task is
/// borrowing another task's urgency through the inheritance swap.
pub fn os_task_location(id: OsTaskId) -> Option<OsSlotId> {
    if (id as usize) >= CFG_MAX_TASKS {
        return None;
    }
    critical_section(|cs| kernel::KSTATE.get(cs).queue.location_of(id))
}
