//! Mutexes with priority inheritance
//!
//! Re-entrant mutual exclusion over a fixed, handle-addressed table.
//! Blocked tasks queue FIFO by arrival and are granted ownership in
//! that order regardless of priority.
//!
//! Inheritance works through the ready queue alone: when a more
//! urgent task blocks on a held mutex, the two parties' queue
//! identities are exchanged, so the owner runs with the waiter's
//! urgency while the waiter sleeps. No TCB priority field exists to
//! boost or restore; release puts the displaced owner back into its
//! own slot and the woken successor lands in its freed home slot.

use crate::config::{CFG_MAX_MUTEX, CFG_MAX_TASKS};
use crate::core::cs_cell::CsCell;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{os_fatal, Fault, KernelResult};
use crate::kernel;
use crate::types::{os_slot_prio, OsMutexHandle, OsMutexState, OsNestingCtr, OsTaskId, OsTaskState};

// ============ Waiter FIFO ============

/// Fixed-capacity ring of blocked task identities, ordered by arrival
pub struct WaitFifo {
    buf: [OsTaskId; CFG_MAX_TASKS],
    head: u8,
    len: u8,
}

impl WaitFifo {
    pub const fn new() -> Self {
        WaitFifo {
            buf: [0; CFG_MAX_TASKS],
            head: 0,
            len: 0,
        }
    }

    pub fn init(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Append an identity at the back. Capacity equals the TCB table,
    /// so a live kernel can never overflow it.
    pub fn push(&mut self, id: OsTaskId) {
        debug_assert!((self.len as usize) < CFG_MAX_TASKS);
        let slot = (self.head as usize + self.len as usize) % CFG_MAX_TASKS;
        self.buf[slot] = id;
        self.len += 1;
    }

    /// Take the identity that has waited longest
    pub fn pop(&mut self) -> Option<OsTaskId> {
        if self.len == 0 {
            return None;
        }
        let id = self.buf[self.head as usize];
        self.head = ((self.head as usize + 1) % CFG_MAX_TASKS) as u8;
        self.len -= 1;
        Some(id)
    }
}

impl Default for WaitFifo {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Mutex record ============

/// One mutex table entry
pub struct OsMutex {
    state: OsMutexState,
    /// Owning task while held
    owner: Option<OsTaskId>,
    /// Re-entrancy depth; zero exactly when not held
    nesting: OsNestingCtr,
    /// Blocked tasks, FIFO by arrival
    waiters: WaitFifo,
}

impl OsMutex {
    const fn new() -> Self {
        OsMutex {
            state: OsMutexState::Uncreated,
            owner: None,
            nesting: 0,
            waiters: WaitFifo::new(),
        }
    }
}

/// Global mutex table
static MUTEX_TBL: CsCell<[OsMutex; CFG_MAX_MUTEX]> =
    CsCell::new([const { OsMutex::new() }; CFG_MAX_MUTEX]);

#[inline]
fn check_handle(handle: OsMutexHandle) {
    if (handle as usize) >= CFG_MAX_MUTEX {
        os_fatal(Fault::MutexHandleInvalid);
    }
}

// ============ Public API ============

/// Reset the whole table to uncreated
pub fn os_mutex_init() {
    critical_section(|cs| {
        for m in MUTEX_TBL.get(cs).iter_mut() {
            m.state = OsMutexState::Uncreated;
            m.owner = None;
            m.nesting = 0;
            m.waiters.init();
        }
    });
}

/// Create a mutex in the lowest uncreated slot.
///
/// Errors with [`Fault::MutexExhausted`] when the table is full; this
/// is the kernel's one recoverable failure.
pub fn os_mutex_create() -> KernelResult<OsMutexHandle> {
    critical_section(|cs| {
        let tbl = MUTEX_TBL.get(cs);
        for (n, m) in tbl.iter_mut().enumerate() {
            if m.state == OsMutexState::Uncreated {
                m.state = OsMutexState::Free;
                m.owner = None;
                m.nesting = 0;
                m.waiters.init();
                return Ok(n as OsMutexHandle);
            }
        }
        Err(Fault::MutexExhausted)
    })
}

/// Acquire a mutex, blocking while another task holds it.
///
/// Re-entrant for the owner. When the caller is more urgent than the
/// holder, the two exchange ready-queue identities before the caller
/// sleeps, which bounds the inversion: the holder inherits the
/// caller's turn position until it releases.
///
/// Fatal on a bad handle, an uncreated mutex, a call from interrupt
/// context, or nesting overflow.
pub fn os_mutex_acquire(handle: OsMutexHandle) {
    check_handle(handle);
    if is_isr_context() {
        os_fatal(Fault::BlockFromIsr);
    }

    critical_section(|cs| {
        let m = &mut MUTEX_TBL.get(cs)[handle as usize];
        if m.state == OsMutexState::Uncreated {
            os_fatal(Fault::MutexUncreated);
        }

        let state = kernel::KSTATE.get(cs);
        let Some(cur) = state.current else {
            return;
        };

        match m.owner {
            None => {
                m.state = OsMutexState::Held;
                m.owner = Some(cur);
                m.nesting = 1;
            }
            Some(owner) if owner == cur => {
                if m.nesting == OsNestingCtr::MAX {
                    os_fatal(Fault::MutexNestingOvf);
                }
                m.nesting += 1;
            }
            Some(owner) => {
                m.waiters.push(cur);

                // Compare effective urgencies, i.e. the priorities of
                // the current queue positions. An owner already
                // boosted by an earlier waiter must not be demoted,
                // and an owner that is itself asleep has no position
                // to lend.
                let cur_loc = state.queue.location_of(cur);
                let owner_loc = state.queue.location_of(owner);
                if let (Some(cl), Some(ol)) = (cur_loc, owner_loc) {
                    if os_slot_prio(cl) < os_slot_prio(ol) {
                        state.queue.swap_identities(cur, owner);
                    }
                }

                // Sleep at whichever slot now carries the caller's
                // identity (the owner's old slot after a swap, the
                // caller's own otherwise).
                state.tcbs[cur as usize].status = OsTaskState::Suspended;
                if let Some(loc) = state.queue.location_of(cur) {
                    state.queue.remove(loc);
                }
                crate::sched::os_schedule();
            }
        }
    });
}

/// Release a mutex.
///
/// Inner releases of a re-entrant acquisition only decrement the
/// count. The final release hands ownership to the longest-waiting
/// blocked task, undoing the inheritance exchange first so both
/// parties return to their own priority positions, and wakes it.
///
/// Fatal on a bad handle, an uncreated mutex, or a caller that is not
/// the owner.
pub fn os_mutex_release(handle: OsMutexHandle) {
    check_handle(handle);

    critical_section(|cs| {
        let m = &mut MUTEX_TBL.get(cs)[handle as usize];
        if m.state == OsMutexState::Uncreated {
            os_fatal(Fault::MutexUncreated);
        }

        let state = kernel::KSTATE.get(cs);
        let Some(owner) = m.owner else {
            os_fatal(Fault::MutexNotOwner);
        };
        if state.current != Some(owner) {
            os_fatal(Fault::MutexNotOwner);
        }

        m.nesting -= 1;
        if m.nesting > 0 {
            return;
        }

        if let Some(successor) = m.waiters.pop() {
            // Undo the inheritance transplant: an acquire-side swap
            // left the owner sitting in a blocked waiter's home slot
            // (the head waiter's, or the most recent blocker's when
            // several waiters each lent their urgency in turn). Any
            // position other than the owner's own slot is borrowed,
            // so send the owner home before the successor wakes into
            // its freed slot.
            let own_slot = state.tcbs[owner as usize].slot_id;
            if let Some(loc) = state.queue.location_of(owner) {
                if loc != own_slot {
                    state.queue.remove(loc);
                    state.queue.insert(own_slot, owner);
                }
            }

            m.owner = Some(successor);
            m.nesting = 1;
            crate::task::os_task_wake(successor);
        } else {
            m.state = OsMutexState::Free;
            m.owner = None;
        }
    });
}

/// Destroy a free mutex.
///
/// Fatal while the mutex is held or any task still waits on it.
pub fn os_mutex_destroy(handle: OsMutexHandle) {
    check_handle(handle);

    critical_section(|cs| {
        let m = &mut MUTEX_TBL.get(cs)[handle as usize];
        if m.state == OsMutexState::Uncreated {
            os_fatal(Fault::MutexUncreated);
        }
        if m.nesting > 0 || !m.waiters.is_empty() {
            os_fatal(Fault::MutexBusy);
        }

        m.state = OsMutexState::Uncreated;
        m.owner = None;
        m.waiters.init();
    });
}

// ============ Introspection ============

/// Lifecycle state of a mutex slot
pub fn os_mutex_state(handle: OsMutexHandle) -> OsMutexState {
    if (handle as usize) >= CFG_MAX_MUTEX {
        return OsMutexState::Uncreated;
    }
    critical_section(|cs| MUTEX_TBL.get(cs)[handle as usize].state)
}

/// Owning task of a held mutex
pub fn os_mutex_owner(handle: OsMutexHandle) -> Option<OsTaskId> {
    if (handle as usize) >= CFG_MAX_MUTEX {
        return None;
    }
    critical_section(|cs| MUTEX_TBL.get(cs)[handle as usize].owner)
}

/// Current re-entrancy depth
pub fn os_mutex_nesting(handle: OsMutexHandle) -> OsNestingCtr {
    if (handle as usize) >= CFG_MAX_MUTEX {
        return 0;
    }
    critical_section(|cs| MUTEX_TBL.get(cs)[handle as usize].nesting)
}

/// Number of tasks blocked on a mutex
pub fn os_mutex_waiters(handle: OsMutexHandle) -> usize {
    if (handle as usize) >= CFG_MAX_MUTEX {
        return 0;
    }
    critical_section(|cs| MUTEX_TBL.get(cs)[handle as usize].waiters.len())
}
