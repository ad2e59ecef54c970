//! Critical sections
//!
//! Every kernel structure is shared between the running task and the
//! interrupt handlers; the exclusive mutation protocol is
//! interrupt-disable based. The guard saves the previous mask state
//! and restores it on drop, so critical sections nest.

/// RAII guard for a critical section.
///
/// Creating the guard masks interrupts; dropping it restores the mask
/// to what it was on entry.
pub struct CriticalSection {
    #[cfg(target_arch = "arm")]
    reenable: bool,
}

impl CriticalSection {
    /// Enter a critical section by masking interrupts.
    #[inline(always)]
    pub fn enter() -> Self {
        #[cfg(target_arch = "arm")]
        {
            let was_active = cortex_m::register::primask::read().is_active();
            cortex_m::interrupt::disable();
            CriticalSection { reenable: was_active }
        }

        #[cfg(not(target_arch = "arm"))]
        CriticalSection {}
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        #[cfg(target_arch = "arm")]
        if self.reenable {
            unsafe { cortex_m::interrupt::enable() };
        }
    }
}

/// Execute a closure with interrupts masked.
///
/// The closure receives a reference to the guard, which unlocks
/// [`CsCell`](crate::core::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an exception handler
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
