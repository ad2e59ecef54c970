//! Global kernel state and initialization
//!
//! The kernel is a singleton: one TCB table, one ready queue, one
//! current-task cursor. Everything mutable lives behind a
//! critical-section cell; the handful of flags the tick interrupt
//! touches are atomics.

use core::sync::atomic::Ordering;

use portable_atomic::{AtomicBool, AtomicU32};

use crate::config::{CFG_MAX_TASKS, CFG_PRIO_BACKGROUND, CFG_PRIO_MAX};
use crate::core::cs_cell::CsCell;
use crate::core::stack::StackPool;
use crate::critical::critical_section;
use crate::sched::ReadyQueue;
use crate::task::OsTcb;
use crate::types::{OsTaskFn, OsTaskId, OsTaskState, OsTick, OsTraceFn};

// ============ Kernel flags ============

/// Atomic kernel flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    tick_counter: AtomicU32,
    tick_event: AtomicBool,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick_counter: AtomicU32::new(0),
            tick_event: AtomicBool::new(false),
        }
    }

    pub(crate) fn reset(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.tick_counter.store(0, Ordering::SeqCst);
        self.tick_event.store(false, Ordering::SeqCst);
    }

    /// Check if multitasking has been started
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if the kernel state has been initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Get current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> OsTick {
        self.tick_counter.load(Ordering::Relaxed)
    }

    /// Increment and return tick count
    #[inline(always)]
    pub(crate) fn tick_increment(&self) -> OsTick {
        self.tick_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Assert the tick event flag. Events occurring while the flag is
    /// already set coalesce into one bookkeeping pass.
    #[inline(always)]
    pub(crate) fn set_tick_event(&self) {
        self.tick_event.store(true, Ordering::Release);
    }

    /// Consume the tick event flag
    #[inline(always)]
    pub(crate) fn take_tick_event(&self) -> bool {
        self.tick_event.swap(false, Ordering::AcqRel)
    }

    #[inline(always)]
    pub(crate) fn set_initialized(&self, val: bool) {
        self.initialized.store(val, Ordering::SeqCst);
    }

    #[inline(always)]
    pub(crate) fn set_running(&self, val: bool) {
        self.running.store(val, Ordering::SeqCst);
    }
}

/// Global kernel flags instance
pub(crate) static KERNEL: KernelFlags = KernelFlags::new();

// ============ Kernel state ============

/// Everything the scheduler and the task/mutex operations mutate
/// under interrupt masking
pub struct KernelState {
    /// TCB table; a task's identity is its index here
    pub(crate) tcbs: [OsTcb; CFG_MAX_TASKS],
    /// The ready queue: sole source of scheduling order
    pub(crate) queue: ReadyQueue,
    /// Identity of the task owning the CPU, if any
    pub(crate) current: Option<OsTaskId>,
    /// Per-priority bitmask of permanently allocated position slots
    pub(crate) slot_used: [u8; CFG_PRIO_MAX],
    /// Descending task-stack allocator
    pub(crate) stacks: StackPool,
    /// Dispatch counters, reported at kernel exit
    pub(crate) activations: [u32; CFG_MAX_TASKS],
    /// Optional per-dispatch trace hook
    pub(crate) trace_hook: Option<OsTraceFn>,
}

impl KernelState {
    const fn new() -> Self {
        Self {
            tcbs: [const { OsTcb::new() }; CFG_MAX_TASKS],
            queue: ReadyQueue::new(),
            current: None,
            slot_used: [0; CFG_PRIO_MAX],
            stacks: StackPool::new(),
            activations: [0; CFG_MAX_TASKS],
            trace_hook: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        for tcb in self.tcbs.iter_mut() {
            tcb.init();
        }
        self.queue.init();
        self.current = None;
        self.slot_used = [0; CFG_PRIO_MAX];
        self.stacks.reset();
        self.activations = [0; CFG_MAX_TASKS];
        self.trace_hook = None;
    }
}

/// Global kernel state instance
pub(crate) static KSTATE: CsCell<KernelState> = CsCell::new(KernelState::new());

/// Borrow the kernel state from a context that already has interrupts
/// masked (the reschedule trap, or inside a critical section).
#[inline(always)]
pub(crate) unsafe fn state_unchecked() -> &'static mut KernelState {
    unsafe { KSTATE.get_unchecked() }
}

// ============ Public API ============

/// Initialize (or re-initialize) the kernel state.
///
/// Every TCB becomes uncreated, the ready queue empties, the stack
/// pool and slot allocator rewind. Must precede any other kernel
/// call; `os_start` performs it implicitly.
pub fn os_init() {
    critical_section(|cs| {
        KSTATE.get(cs).reset();
        KERNEL.reset();
        KERNEL.set_initialized(true);
    });
}

/// Start multitasking. Never returns.
///
/// Configures the periodic tick and the reschedule trap, creates and
/// activates the initial task at the background priority, then opens
/// interrupts. The first reschedule abandons the boot context for
/// good.
pub fn os_start(entry: OsTaskFn, arg: *mut ()) -> ! {
    os_init();

    #[cfg(target_arch = "arm")]
    cortex_m::interrupt::disable();

    crate::port::os_trap_init();
    crate::port::os_systick_init(
        crate::config::CFG_CPU_CLK_HZ / crate::config::CFG_TICK_RATE_HZ,
    );

    let id = crate::task::os_task_create(entry, CFG_PRIO_BACKGROUND, arg);
    crate::task::os_task_activate(id);

    KERNEL.set_running(true);

    #[cfg(target_arch = "arm")]
    unsafe {
        cortex_m::interrupt::enable()
    };

    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
    }
}

/// Terminate the kernel: report per-task activation counters on the
/// diagnostic sink, mask interrupts, park the CPU.
///
/// On the host this panics so tests can observe the all-idle exit.
pub fn os_exit() -> ! {
    #[cfg(target_arch = "arm")]
    cortex_m::interrupt::disable();

    let state = unsafe { state_unchecked() };
    for (id, count) in state.activations.iter().enumerate() {
        if state.tcbs[id].status != OsTaskState::Uncreated {
            crate::info!("task {} activations: {}", id, count);

            #[cfg(all(target_arch = "arm", not(feature = "defmt")))]
            cortex_m_semihosting::hprintln!("task {} activations: {}", id, count);
        }
    }

    #[cfg(target_arch = "arm")]
    loop {
        cortex_m::asm::wfi();
    }

    #[cfg(not(target_arch = "arm"))]
    panic!("kernel exit: nothing left to schedule");
}

/// Identity of the task currently owning the CPU
pub fn os_current() -> Option<OsTaskId> {
    critical_section(|cs| KSTATE.get(cs).current)
}

/// Install a dispatch trace hook, called with the elected identity
/// and a separator (`'|'` on elections that consumed a tick event)
pub fn os_set_trace_hook(hook: OsTraceFn) {
    critical_section(|cs| {
        KSTATE.get(cs).trace_hook = Some(hook);
    });
}

/// Check if multitasking has been started
#[inline]
pub fn os_is_running() -> bool {
    KERNEL.is_running()
}
