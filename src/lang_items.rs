//! Language items and default exception handlers

// With defmt on ARM, defmt-rtt carries the transport and panic-probe
// the panic handler
#[cfg(all(feature = "defmt", target_arch = "arm"))]
use defmt_rtt as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use panic_probe as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

// Without defmt, panics park the core
#[cfg(all(not(feature = "defmt"), target_arch = "arm"))]
use panic_halt as _;

// Default HardFault handler
#[cfg(target_arch = "arm")]
#[cortex_m_rt::exception]
unsafe fn HardFault(_ef: &cortex_m_rt::ExceptionFrame) -> ! {
    loop {
        cortex_m::asm::udf();
    }
}

// Defmt timestamps come from the kernel tick counter
#[cfg(all(feature = "defmt", target_arch = "arm"))]
defmt::timestamp!("{=u32}", crate::core::kernel::KERNEL.tick_get());
