//! Cortex-M4 port implementation
//!
//! NVIC lines, system handler priorities, SysTick and the DWT cycle counter.
//! Priorities are passed around unshifted (0..=15) and moved into the
//! implemented upper bits only here.

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::scb::{SystemHandler, VectActive};
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{DWT, NVIC, SCB, SYST};
use cortex_m::register::primask;

use crate::config::CFG_NVIC_PRIO_BITS;
use crate::port::Port;
use crate::types::{IrqPrio, SystemIrq};

/// AIRCR write key
const AIRCR_VECTKEY: u32 = 0x05FA << 16;

/// PRIGROUP value giving all implemented bits to preemption
const AIRCR_PRIGROUP_4: u32 = 3 << 8;

/// SHCSR SVCALLPENDED
const SHCSR_SVCALLPENDED: u32 = 1 << 15;

/// Raw NVIC line number
#[derive(Clone, Copy)]
struct Line(u16);

unsafe impl InterruptNumber for Line {
    #[inline(always)]
    fn number(self) -> u16 {
        self.0
    }
}

#[inline(always)]
fn hw_prio(prio: IrqPrio) -> u8 {
    prio << (8 - CFG_NVIC_PRIO_BITS)
}

/// Cortex-M4 hardware port
///
/// # Example
/// For a 168MHz core: `static PORT: CortexM4 = CortexM4::new(168_000_000);`
pub struct CortexM4 {
    core_clock_hz: u32,
}

impl CortexM4 {
    pub const fn new(core_clock_hz: u32) -> Self {
        Self { core_clock_hz }
    }
}

impl Port for CortexM4 {
    #[inline(always)]
    fn irqs_enabled(&self) -> bool {
        primask::read().is_active()
    }

    #[inline(always)]
    fn irq_disable(&self) {
        cortex_m::interrupt::disable();
    }

    #[inline(always)]
    fn irq_enable(&self) {
        unsafe { cortex_m::interrupt::enable() };
    }

    #[inline(always)]
    fn in_isr(&self) -> bool {
        SCB::vect_active() != VectActive::ThreadMode
    }

    fn init_controller(&self, external_count: usize) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };

        unsafe { p.SCB.aircr.write(AIRCR_VECTKEY | AIRCR_PRIGROUP_4) };

        for irq in 0..external_count as u16 {
            NVIC::mask(Line(irq));
            NVIC::unpend(Line(irq));
        }

        // Execution-time statistics run off the cycle counter
        p.DCB.enable_trace();
        p.DWT.enable_cycle_counter();
    }

    #[inline]
    fn enable_irq(&self, irq: u16) {
        unsafe { NVIC::unmask(Line(irq)) };
    }

    #[inline]
    fn disable_irq(&self, irq: u16) {
        NVIC::mask(Line(irq));
    }

    fn set_irq_priority(&self, irq: u16, prio: IrqPrio) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };
        unsafe { p.NVIC.set_priority(Line(irq), hw_prio(prio)) };
    }

    fn set_system_priority(&self, sys: SystemIrq, prio: IrqPrio) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };
        let handler = match sys {
            SystemIrq::SysTick => SystemHandler::SysTick,
            SystemIrq::PendSv => SystemHandler::PendSV,
            SystemIrq::SvCall => SystemHandler::SVCall,
        };
        unsafe { p.SCB.set_priority(handler, hw_prio(prio)) };
    }

    #[inline]
    fn is_irq_pending(&self, irq: u16) -> bool {
        NVIC::is_pending(Line(irq))
    }

    fn is_system_pending(&self, sys: SystemIrq) -> bool {
        match sys {
            SystemIrq::SysTick => SCB::is_pendst_pending(),
            SystemIrq::PendSv => SCB::is_pendsv_pending(),
            SystemIrq::SvCall => {
                let p = unsafe { cortex_m::Peripherals::steal() };
                p.SCB.shcsr.read() & SHCSR_SVCALLPENDED != 0
            }
        }
    }

    #[inline]
    fn pend_irq(&self, irq: u16) {
        NVIC::pend(Line(irq));
    }

    #[inline]
    fn unpend_irq(&self, irq: u16) {
        NVIC::unpend(Line(irq));
    }

    #[inline(always)]
    fn cycle_count(&self) -> u32 {
        DWT::cycle_count()
    }

    #[inline(always)]
    fn core_clock_hz(&self) -> u32 {
        self.core_clock_hz
    }

    /// Configure SysTick for tick generation
    ///
    /// For 168MHz clock with 1000Hz tick rate: reload = 168_000_000 / 1000 - 1
    fn systick_start(&self, reload: u32) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };

        p.SYST.set_reload(reload);
        p.SYST.clear_current();
        p.SYST.set_clock_source(SystClkSource::Core);
        p.SYST.enable_interrupt();
        p.SYST.enable_counter();
    }

    fn systick_stop(&self) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };

        p.SYST.disable_counter();
        p.SYST.disable_interrupt();
    }

    #[inline]
    fn systick_elapsed(&self) -> u32 {
        // SysTick counts down from the reload value
        SYST::get_reload().wrapping_sub(SYST::get_current())
    }

    #[inline]
    fn systick_wrapped(&self) -> bool {
        SCB::is_pendst_pending()
    }
}
