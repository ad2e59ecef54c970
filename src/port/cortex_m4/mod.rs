//! Cortex-M port
//!
//! Context switching rides the PendSV exception at the lowest
//! exception priority. Tasks run in thread mode on the main stack, so
//! the hardware-pushed frame and the handler-pushed remainder sit
//! directly on the outgoing task's stack and the switch routine works
//! on plain stack pointers.

use core::arch::naked_asm;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::types::{OsStkElement, OsTaskFn};

/// Thumb code pointers carry bit 0 set; the frame stores the plain
/// address and the T bit travels in xPSR
const THUMB_ADDR_MASK: u32 = 0xFFFF_FFFE;

/// Return to thread mode, main stack, no FP state
const TASK_EXC_RETURN: u32 = 0xFFFF_FFF9;

/// Initial xPSR: Thumb bit only
const TASK_PSR: u32 = 0x0100_0000;

/// Configure the SysTick timer for periodic tick generation
///
/// # Arguments
/// * `cnts` - Reload value, core clock divided by the tick rate
pub fn os_systick_init(cnts: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(cnts - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Put the reschedule trap and the tick at the lowest exception
/// priority so kernel API critical sections outrank both
pub fn os_trap_init() {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;
        scb.set_priority(SystemHandler::PendSV, 0xF0);
        scb.set_priority(SystemHandler::SysTick, 0xF0);
    }
}

/// Pend the reschedule trap
#[inline(always)]
pub fn os_schedule_trap() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// CPU context as laid out on a task stack: the handler-saved
/// remainder below the hardware-pushed exception frame
#[repr(C, align(4))]
struct InitFrame {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

const FRAME_WORDS: usize = 17;

/// Compose the initial CPU frame at the top of a task stack.
///
/// The first dispatch pops this frame: `entry` lands in pc with the
/// task argument in r0, and the link register points at the task-end
/// trampoline so a returning task is retired cleanly.
///
/// # Safety
/// `stk_top` must be the top of a private region with room for the
/// frame.
pub unsafe fn os_task_stk_init(
    entry: OsTaskFn,
    arg: *mut (),
    stk_top: *mut OsStkElement,
) -> *mut OsStkElement {
    unsafe {
        // Align down to the 8-byte boundary exception entry expects
        let aligned = ((stk_top as usize) & !7) as *mut u32;
        let frame = aligned.sub(FRAME_WORDS) as *mut InitFrame;

        (*frame) = InitFrame {
            r4: 0,
            r5: 0,
            r6: 0,
            r7: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            exc_return: TASK_EXC_RETURN,
            r0: arg as u32,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: crate::task::os_task_end as *const () as u32,
            pc: (entry as usize as u32) & THUMB_ADDR_MASK,
            xpsr: TASK_PSR,
        };

        frame as *mut OsStkElement
    }
}

/// PendSV exception handler
///
/// 1. Save r4-r11 and the exception return value onto the outgoing
///    stack, below the hardware-pushed frame
/// 2. Hand the stack pointer to the switch routine
/// 3. Adopt the returned stack pointer
/// 4. Restore and return; hardware pops the rest
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid  i",
        "dsb",
        "isb",
        "push   {{r4-r11, lr}}",
        "mov    r0, sp",
        "bl     os_context_switch",
        "mov    sp, r0",
        "pop    {{r4-r11, lr}}",
        "cpsie  i",
        "dsb",
        "isb",
        "bx     lr",
    );
}
