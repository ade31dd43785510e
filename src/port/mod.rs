//! Port layer - CPU-specific implementations
//!
//! Everything that touches processor registers goes through [`Port`]. The
//! interrupt registry, dispatcher and timer scheduler are generic over it, so
//! the same code runs on the Cortex-M4 and on the host simulator.

use crate::types::{IrqPrio, SystemIrq};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m4::CortexM4;

// Simulated hardware for host builds and tests
#[cfg(not(target_os = "none"))]
pub mod sim;

#[cfg(not(target_os = "none"))]
pub use sim::SimPort;

/// Hardware services required by the interrupt and timer core
pub trait Port: Sync {
    // ============ Global mask ============

    /// Whether maskable interrupts are currently delivered (PRIMASK clear)
    fn irqs_enabled(&self) -> bool;

    /// Mask all maskable interrupts
    fn irq_disable(&self);

    /// Unmask all maskable interrupts
    fn irq_enable(&self);

    /// Whether the caller runs in handler mode
    fn in_isr(&self) -> bool;

    // ============ Interrupt controller ============

    /// One-time controller setup: priority grouping, every external line masked and un-pended
    fn init_controller(&self, external_count: usize);

    fn enable_irq(&self, irq: u16);

    fn disable_irq(&self, irq: u16);

    /// Set priority of an external line (0 = highest, unshifted)
    fn set_irq_priority(&self, irq: u16, prio: IrqPrio);

    /// Set priority of a system exception (0 = highest, unshifted)
    fn set_system_priority(&self, sys: SystemIrq, prio: IrqPrio);

    fn is_irq_pending(&self, irq: u16) -> bool;

    fn is_system_pending(&self, sys: SystemIrq) -> bool;

    fn pend_irq(&self, irq: u16);

    fn unpend_irq(&self, irq: u16);

    // ============ Timing ============

    /// Free-running processor cycle counter
    fn cycle_count(&self) -> u32;

    /// Processor clock frequency supplied by the clock subsystem
    fn core_clock_hz(&self) -> u32;

    /// Start the periodic tick with the given reload value
    fn systick_start(&self, reload: u32);

    fn systick_stop(&self);

    /// Cycles elapsed since the last SysTick reload
    fn systick_elapsed(&self) -> u32;

    /// A SysTick wrap happened that has not been serviced yet
    fn systick_wrapped(&self) -> bool;
}

/// Convert a cycle delta to microseconds at the given clock
#[inline]
pub fn cycles_to_us(cycles: u32, core_clock_hz: u32) -> u32 {
    let per_us = core_clock_hz / 1_000_000;
    if per_us == 0 {
        0
    } else {
        cycles / per_us
    }
}
