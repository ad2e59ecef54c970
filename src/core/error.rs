//! Fault classes and the fatal diagnostic path
//!
//! Contract violations in this kernel are programmer errors: they are
//! reported once and the kernel parks. There is no recovery machinery.
//! The only recoverable surface is mutex creation, which reports table
//! exhaustion through [`KernelResult`].

/// Fatal fault classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Fault {
    /// Requested priority is outside 0..CFG_PRIO_MAX
    PrioInvalid,
    /// No free TCB for a new task
    TcbExhausted,
    /// No free intra-priority slot at the requested priority
    SlotExhausted,
    /// Stack pool cannot hold another task stack
    StackExhausted,
    /// activate() on an uncreated task
    ActivateUncreated,
    /// wake() on an uncreated task
    WakeUncreated,
    /// Blocking call (sleep, delay, acquire) from interrupt context
    BlockFromIsr,
    /// Mutex handle out of range
    MutexHandleInvalid,
    /// acquire/release/destroy on an uncreated mutex
    MutexUncreated,
    /// No free mutex slot (reported via Result, never fatal)
    MutexExhausted,
    /// release() by a task that is not the owner
    MutexNotOwner,
    /// Re-entrant acquisition counter overflow
    MutexNestingOvf,
    /// destroy() while held or with queued waiters
    MutexBusy,
    /// The ready queue is empty: every task has exited
    AllTasksExited,
}

/// Result type for the kernel's recoverable surfaces
pub type KernelResult<T> = Result<T, Fault>;

/// Report a fault on the diagnostic sink and park the CPU.
///
/// On the host this panics instead, so tests can observe the fault.
pub fn os_fatal(fault: Fault) -> ! {
    crate::error!("kernel fault: {}", fault);

    #[cfg(all(target_arch = "arm", not(feature = "defmt")))]
    {
        use cortex_m_semihosting::hprintln;
        hprintln!("kernel fault: {:?}", fault);
    }

    #[cfg(target_arch = "arm")]
    {
        cortex_m::interrupt::disable();
        loop {
            cortex_m::asm::wfi();
        }
    }

    #[cfg(not(target_arch = "arm"))]
    panic!("kernel fault: {:?}", fault);
}
