//! Scheduler
//!
//! Fixed-priority preemptive election with round-robin inside each
//! priority class. A reschedule is requested by pending the low-
//! priority trap; the trap handler saves the outgoing context on the
//! task's own stack and funnels through [`os_context_switch`], which
//! is the single place a task is ever elected.

mod queue;

pub use queue::ReadyQueue;

use crate::error::Fault;
use crate::kernel;
use crate::types::{OsStkElement, OsTaskState};

/// Request that the scheduler run at the next safe point.
///
/// Safe from any context; the switch itself happens when the pended
/// trap is taken, never inside the caller.
#[inline]
pub fn os_schedule() {
    crate::port::os_schedule_trap();
}

/// The context switch.
///
/// Called by the reschedule trap with interrupts masked and the
/// outgoing stack pointer in `sp`; returns the stack pointer the trap
/// must adopt. The boot context arrives with no current task and its
/// stack is abandoned unsaved.
///
/// A consumed tick event triggers the delay bookkeeping pass before
/// election. An empty queue means every task has exited, which ends
/// the kernel.
#[no_mangle]
pub unsafe extern "C-unwind" fn os_context_switch(sp: *mut OsStkElement) -> *mut OsStkElement {
    let state = unsafe { kernel::state_unchecked() };

    // Bank the outgoing context. A task that suspended itself keeps
    // its suspended status; a preempted runner goes back to ready.
    if let Some(cur) = state.current {
        let tcb = &mut state.tcbs[cur as usize];
        if !sp.is_null() {
            tcb.stk_ptr = sp;
        }
        if tcb.status == OsTaskState::Running {
            tcb.status = OsTaskState::Ready;
        }
    }

    let ticked = kernel::KERNEL.take_tick_event();
    if ticked {
        crate::time::tick_bookkeeping(state);
    }

    let Some(next) = state.queue.next() else {
        crate::error!("kernel fault: {}", Fault::AllTasksExited);
        kernel::os_exit();
    };

    state.current = Some(next);
    state.activations[next as usize] = state.activations[next as usize].wrapping_add(1);

    if let Some(hook) = state.trace_hook {
        hook(next, if ticked { '|' } else { ' ' });
    }

    let tcb = &mut state.tcbs[next as usize];
    tcb.status = OsTaskState::Running;

    // A null saved pointer marks a task that has never been switched
    // out: hand the trap the initial frame instead.
    if tcb.stk_ptr.is_null() {
        tcb.stk_start
    } else {
        tcb.stk_ptr
    }
}
