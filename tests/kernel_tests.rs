//! Host-run kernel tests
//!
//! The stub port never delivers the reschedule trap, so these tests
//! drive `os_context_switch` by hand and play the role of whichever
//! task is current. The kernel is a singleton; tests serialise on a
//! process-wide lock and reset the state in `setup`.

use std::ptr;
use std::sync::{Mutex, MutexGuard};

use picokernel::{
    os_context_switch, os_current, os_init, os_slot_id, os_task_activate, os_task_create,
    os_task_end, os_task_location, os_task_sleep, os_task_status, os_task_wake, os_tick,
    os_time_dly, os_time_get, OsPrio, OsTaskId, OsTaskState,
};

static LOCK: Mutex<()> = Mutex::new(());

fn setup() -> MutexGuard<'static, ()> {
    let guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    os_init();
    #[cfg(feature = "mutex")]
    picokernel::os_mutex_init();
    guard
}

fn task_stub(_: *mut ()) {}

/// Create and activate a task at the given priority
fn spawn(prio: OsPrio) -> OsTaskId {
    let id = os_task_create(task_stub, prio, ptr::null_mut());
    os_task_activate(id);
    id
}

/// Run one election and report who won
fn dispatch() -> OsTaskId {
    unsafe { os_context_switch(ptr::null_mut()) };
    os_current().expect("election should have found a task")
}

/// At most one task is ever in the running state (P1)
fn assert_single_runner() {
    let runners = (0..picokernel::CFG_MAX_TASKS as OsTaskId)
        .filter(|&id| os_task_status(id) == OsTaskState::Running)
        .count();
    assert!(runners <= 1, "found {} running tasks", runners);
}

mod scheduler {
    use super::*;

    #[test]
    fn urgent_class_always_preempts() {
        let _g = setup();
        let high = spawn(2);
        let _mid = spawn(4);
        let _low = spawn(6);

        // While the most urgent task stays ready it wins every single
        // election
        for _ in 0..5 {
            assert_eq!(dispatch(), high);
            assert_single_runner();
        }
    }

    #[test]
    fn dispatch_order_follows_priority_as_tasks_suspend() {
        let _g = setup();
        let a = spawn(2);
        let b = spawn(4);
        let c = spawn(6);
        let _bg = spawn(7);

        // Each task runs, suspends, and the next class gets the CPU:
        // 2, 4, 6 — then again after all three wake
        let mut order = Vec::new();
        for _ in 0..3 {
            let id = dispatch();
            order.push(id);
            os_task_sleep();
        }
        assert_eq!(order, vec![a, b, c]);

        os_task_wake(a);
        os_task_wake(b);
        os_task_wake(c);

        let mut order = Vec::new();
        for _ in 0..3 {
            let id = dispatch();
            order.push(id);
            os_task_sleep();
        }
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn round_robin_within_one_class() {
        let _g = setup();
        let a = spawn(4);
        let b = spawn(4);

        // Both continuously ready: strict alternation, one advance
        // per election
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(dispatch());
        }
        assert_eq!(seen, vec![a, b, a, b, a, b]);
    }

    #[test]
    fn ended_task_returns_to_created_and_leaves_queue() {
        let _g = setup();
        let _bg = spawn(7);
        let t = spawn(3);

        assert_eq!(dispatch(), t);
        os_task_end();

        assert_eq!(os_task_status(t), OsTaskState::Created);
        assert_eq!(os_task_location(t), None);

        // Re-activation rebuilds the initial frame and the task is
        // schedulable again
        os_task_activate(t);
        assert_eq!(os_task_status(t), OsTaskState::Ready);
        assert_eq!(os_task_location(t), Some(os_slot_id(3, 0)));
        assert_eq!(dispatch(), t);
    }

    #[test]
    fn woken_task_reenters_at_its_own_slot() {
        let _g = setup();
        let _bg = spawn(7);
        let t = spawn(4);

        assert_eq!(dispatch(), t);
        os_task_sleep();
        assert_eq!(os_task_status(t), OsTaskState::Suspended);
        assert_eq!(os_task_location(t), None);

        os_task_wake(t);
        assert_eq!(os_task_status(t), OsTaskState::Ready);
        assert_eq!(os_task_location(t), Some(os_slot_id(4, 0)));
        assert_eq!(dispatch(), t);
    }

    #[test]
    fn waking_a_ready_task_is_harmless() {
        let _g = setup();
        let t = spawn(4);

        os_task_wake(t);
        os_task_wake(t);
        assert_eq!(os_task_status(t), OsTaskState::Ready);
        assert_eq!(dispatch(), t);
    }

    static TRACE: Mutex<Vec<(OsTaskId, char)>> = Mutex::new(Vec::new());

    fn record_election(id: OsTaskId, sep: char) {
        TRACE
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, sep));
    }

    #[test]
    fn trace_hook_sees_elections_and_tick_marks() {
        let _g = setup();
        TRACE.lock().unwrap_or_else(|e| e.into_inner()).clear();

        let t = spawn(4);
        picokernel::os_set_trace_hook(record_election);

        assert_eq!(dispatch(), t);
        os_tick();
        assert_eq!(dispatch(), t);

        let trace = TRACE.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(*trace, vec![(t, ' '), (t, '|')]);
    }
}

mod delays {
    use super::*;

    #[test]
    fn delay_counts_down_one_per_tick_and_requeues() {
        let _g = setup();
        let bg = spawn(7);
        let t = spawn(4);

        assert_eq!(dispatch(), t);
        os_time_dly(3);
        assert_eq!(os_task_status(t), OsTaskState::Suspended);

        // Two ticks: still asleep, the background task keeps the CPU
        for _ in 0..2 {
            os_tick();
            assert_eq!(dispatch(), bg);
            assert_eq!(os_task_status(t), OsTaskState::Suspended);
        }

        // Third tick expires the delay; the task is back at its own
        // slot and wins the next election over the background class
        os_tick();
        assert_eq!(dispatch(), t);
        assert_eq!(os_task_location(t), Some(os_slot_id(4, 0)));
    }

    #[test]
    fn zero_delay_returns_immediately() {
        let _g = setup();
        let t = spawn(4);

        assert_eq!(dispatch(), t);
        os_time_dly(0);
        assert_eq!(os_task_status(t), OsTaskState::Running);
        assert_eq!(dispatch(), t);
    }

    #[test]
    fn tick_counter_advances() {
        let _g = setup();
        let before = os_time_get();
        os_tick();
        os_tick();
        assert_eq!(os_time_get(), before + 2);
    }
}

#[cfg(feature = "mutex")]
mod mutexes {
    use super::*;
    use picokernel::{
        os_mutex_acquire, os_mutex_create, os_mutex_destroy, os_mutex_nesting, os_mutex_owner,
        os_mutex_release, os_mutex_state, os_mutex_waiters, OsMutexState,
    };

    #[test]
    fn uncontended_acquire_release_round_trip() {
        let _g = setup();
        let _bg = spawn(7);
        let t = spawn(4);
        assert_eq!(dispatch(), t);

        let m = os_mutex_create().unwrap();
        assert_eq!(os_mutex_state(m), OsMutexState::Free);

        os_mutex_acquire(m);
        assert_eq!(os_mutex_state(m), OsMutexState::Held);
        assert_eq!(os_mutex_owner(m), Some(t));
        assert_eq!(os_mutex_nesting(m), 1);

        os_mutex_release(m);
        assert_eq!(os_mutex_state(m), OsMutexState::Free);
        assert_eq!(os_mutex_owner(m), None);
        assert_eq!(os_mutex_nesting(m), 0);
        assert_eq!(os_mutex_waiters(m), 0);
    }

    #[test]
    fn reentrant_acquire_counts_nesting() {
        let _g = setup();
        let t = spawn(4);
        assert_eq!(dispatch(), t);

        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);
        assert_eq!(os_mutex_nesting(m), 1);
        os_mutex_acquire(m);
        assert_eq!(os_mutex_nesting(m), 2);

        os_mutex_release(m);
        assert_eq!(os_mutex_nesting(m), 1);
        assert_eq!(os_mutex_owner(m), Some(t));
        assert_eq!(os_mutex_state(m), OsMutexState::Held);

        os_mutex_release(m);
        assert_eq!(os_mutex_nesting(m), 0);
        assert_eq!(os_mutex_state(m), OsMutexState::Free);
    }

    #[test]
    fn priority_inversion_is_bounded_by_inheritance() {
        let _g = setup();
        let high = spawn(2);
        let med = spawn(4);
        let low = spawn(6);
        let _bg = spawn(7);

        // Freeze the urgent pair so the low task can take the lock
        // first, as in the classic inversion setup
        assert_eq!(dispatch(), high);
        os_task_sleep();
        assert_eq!(dispatch(), med);
        os_task_sleep();
        assert_eq!(dispatch(), low);

        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);
        assert_eq!(os_mutex_owner(m), Some(low));

        os_task_wake(high);
        os_task_wake(med);
        assert_eq!(dispatch(), high);

        // The urgent task blocks on the lock: it leaves the queue and
        // the holder inherits its turn position
        os_mutex_acquire(m);
        assert_eq!(os_task_status(high), OsTaskState::Suspended);
        assert_eq!(os_task_location(high), None);
        assert_eq!(os_mutex_waiters(m), 1);
        assert_eq!(os_task_location(low), Some(os_slot_id(2, 0)));

        // While the lock is held the owner runs in the urgent slot;
        // the medium task never gets the CPU (bounded inversion)
        for _ in 0..4 {
            assert_eq!(dispatch(), low);
            assert_single_runner();
        }

        // Release: identities un-swap, ownership transfers FIFO, the
        // urgent task wakes in its own slot and wins immediately
        os_mutex_release(m);
        assert_eq!(os_mutex_owner(m), Some(high));
        assert_eq!(os_mutex_nesting(m), 1);
        assert_eq!(os_task_location(low), Some(os_slot_id(6, 0)));
        assert_eq!(os_task_location(high), Some(os_slot_id(2, 0)));
        assert_eq!(dispatch(), high);

        // Only after the urgent task is done does the medium one run
        os_mutex_release(m);
        os_task_sleep();
        assert_eq!(dispatch(), med);
    }

    #[test]
    fn equal_priority_waiter_blocks_without_swap() {
        let _g = setup();
        let a = spawn(4);
        let b = spawn(4);
        let _bg = spawn(7);

        assert_eq!(dispatch(), a);
        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);

        assert_eq!(dispatch(), b);
        os_mutex_acquire(m);

        // No urgency to lend: the waiter just sleeps and the owner
        // keeps its own slot
        assert_eq!(os_task_status(b), OsTaskState::Suspended);
        assert_eq!(os_task_location(a), Some(os_slot_id(4, 0)));

        assert_eq!(dispatch(), a);
        os_mutex_release(m);
        assert_eq!(os_mutex_owner(m), Some(b));

        // Same class, so the released owner finishes its turn before
        // the freshly queued successor's comes up
        assert_eq!(dispatch(), a);
        assert_eq!(dispatch(), b);
    }

    #[test]
    fn waiters_are_granted_in_fifo_order() {
        let _g = setup();
        let owner = spawn(5);
        let w1 = spawn(3);
        let w2 = spawn(2);
        let _bg = spawn(7);

        // Owner takes the lock while the future waiters sleep
        assert_eq!(dispatch(), w2);
        os_task_sleep();
        assert_eq!(dispatch(), w1);
        os_task_sleep();
        assert_eq!(dispatch(), owner);
        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);

        // w1 blocks first, then w2; grant order must follow arrival
        // even though w2 is more urgent
        os_task_wake(w1);
        assert_eq!(dispatch(), w1);
        os_mutex_acquire(m);
        os_task_wake(w2);
        assert_eq!(dispatch(), w2);
        os_mutex_acquire(m);
        assert_eq!(os_mutex_waiters(m), 2);

        // While both wait, the owner runs with the most urgent
        // waiter's turn position
        assert_eq!(dispatch(), owner);
        assert_eq!(os_task_location(owner), Some(os_slot_id(2, 0)));

        os_mutex_release(m);
        assert_eq!(os_mutex_owner(m), Some(w1));
        assert_eq!(os_task_location(owner), Some(os_slot_id(5, 0)));

        assert_eq!(dispatch(), w1);
        os_mutex_release(m);
        assert_eq!(os_mutex_owner(m), Some(w2));
        assert_eq!(os_mutex_waiters(m), 0);
        assert_eq!(dispatch(), w2);
        assert_eq!(os_task_location(w2), Some(os_slot_id(2, 0)));
    }

    #[test]
    fn destroy_after_full_release_succeeds() {
        let _g = setup();
        let t = spawn(4);
        assert_eq!(dispatch(), t);

        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);
        os_mutex_release(m);
        os_mutex_destroy(m);
        assert_eq!(os_mutex_state(m), OsMutexState::Uncreated);

        // The slot is reusable
        assert_eq!(os_mutex_create().unwrap(), m);
    }

    #[test]
    fn create_fills_lowest_slot_first() {
        let _g = setup();
        let a = os_mutex_create().unwrap();
        let b = os_mutex_create().unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);

        os_mutex_destroy(a);
        assert_eq!(os_mutex_create().unwrap(), a);
    }

    #[test]
    #[should_panic(expected = "kernel fault")]
    fn destroying_a_held_mutex_is_fatal() {
        let _g = setup();
        let t = spawn(4);
        assert_eq!(dispatch(), t);

        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);
        os_mutex_destroy(m);
    }

    #[test]
    #[should_panic(expected = "kernel fault")]
    fn releasing_someone_elses_mutex_is_fatal() {
        let _g = setup();
        let a = spawn(3);
        let _b = spawn(4);

        assert_eq!(dispatch(), a);
        let m = os_mutex_create().unwrap();
        os_mutex_acquire(m);
        os_task_sleep();

        // The next task up is not the owner
        dispatch();
        os_mutex_release(m);
    }

    #[test]
    #[should_panic(expected = "kernel fault")]
    fn acquiring_an_uncreated_mutex_is_fatal() {
        let _g = setup();
        let t = spawn(4);
        assert_eq!(dispatch(), t);
        os_mutex_acquire(0);
    }
}

mod fatal_paths {
    use super::*;

    #[test]
    #[should_panic(expected = "kernel fault")]
    fn waking_an_uncreated_task_is_fatal() {
        let _g = setup();
        os_task_wake(7);
    }

    #[test]
    #[should_panic(expected = "kernel fault")]
    fn creating_with_invalid_priority_is_fatal() {
        let _g = setup();
        os_task_create(task_stub, picokernel::CFG_PRIO_MAX as OsPrio, ptr::null_mut());
    }

    #[test]
    #[should_panic(expected = "kernel exit")]
    fn last_task_ending_exits_the_kernel() {
        let _g = setup();
        let t = spawn(4);
        assert_eq!(dispatch(), t);
        os_task_end();
        dispatch();
    }
}
