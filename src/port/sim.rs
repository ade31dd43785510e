//! Simulated port for host builds
//!
//! Records every hardware effect in atomics so tests can observe the mask
//! state, per-line configuration and SysTick setup. Time only moves when a
//! test advances the cycle counter, or by a fixed step on every read.

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::config::{CFG_IRQ_PRIO_MAX, CFG_MAX_EXTERNAL_IRQS};
use crate::port::Port;
use crate::types::{IrqPrio, SystemIrq};

pub struct SimPort {
    irqs_enabled: AtomicBool,
    in_isr: AtomicBool,
    controller_inits: AtomicU32,
    enabled: [AtomicBool; CFG_MAX_EXTERNAL_IRQS],
    pending: [AtomicBool; CFG_MAX_EXTERNAL_IRQS],
    priority: [AtomicU8; CFG_MAX_EXTERNAL_IRQS],
    system_priority: [AtomicU8; SystemIrq::COUNT],
    system_pending: [AtomicBool; SystemIrq::COUNT],
    core_clock_hz: u32,
    cycles: AtomicU32,
    cycle_step: AtomicU32,
    systick_running: AtomicBool,
    systick_reload: AtomicU32,
    systick_base: AtomicU32,
    hw_writes: AtomicU32,
}

impl SimPort {
    /// New simulated core running at `core_clock_hz`, interrupts enabled
    pub fn new(core_clock_hz: u32) -> Self {
        Self {
            irqs_enabled: AtomicBool::new(true),
            in_isr: AtomicBool::new(false),
            controller_inits: AtomicU32::new(0),
            enabled: core::array::from_fn(|_| AtomicBool::new(false)),
            pending: core::array::from_fn(|_| AtomicBool::new(false)),
            priority: core::array::from_fn(|_| AtomicU8::new(0)),
            system_priority: core::array::from_fn(|_| AtomicU8::new(0)),
            system_pending: core::array::from_fn(|_| AtomicBool::new(false)),
            core_clock_hz,
            cycles: AtomicU32::new(0),
            cycle_step: AtomicU32::new(0),
            systick_running: AtomicBool::new(false),
            systick_reload: AtomicU32::new(0),
            systick_base: AtomicU32::new(0),
            hw_writes: AtomicU32::new(0),
        }
    }

    // ============ Test controls ============

    /// Move the cycle counter forward
    pub fn advance_cycles(&self, cycles: u32) {
        self.cycles.fetch_add(cycles, Ordering::SeqCst);
    }

    /// Move the cycle counter forward by whole microseconds
    pub fn advance_us(&self, us: u32) {
        self.advance_cycles(us.wrapping_mul(self.core_clock_hz / 1_000_000));
    }

    /// Advance the cycle counter by `step` on every timing read
    pub fn set_cycle_step(&self, step: u32) {
        self.cycle_step.store(step, Ordering::SeqCst);
    }

    /// Pretend the caller runs in handler mode
    pub fn set_in_isr(&self, in_isr: bool) {
        self.in_isr.store(in_isr, Ordering::SeqCst);
    }

    /// Mark a line pending as if the peripheral raised it
    pub fn raise(&self, irq: u16) {
        self.pending[irq as usize].store(true, Ordering::SeqCst);
    }

    /// Mark the SysTick wrap as serviced
    pub fn ack_systick(&self) {
        let period = self.systick_reload.load(Ordering::SeqCst).wrapping_add(1);
        self.systick_base.fetch_add(period, Ordering::SeqCst);
    }

    // ============ Observations ============

    pub fn is_enabled(&self, irq: u16) -> bool {
        self.enabled[irq as usize].load(Ordering::SeqCst)
    }

    pub fn priority(&self, irq: u16) -> IrqPrio {
        self.priority[irq as usize].load(Ordering::SeqCst)
    }

    pub fn system_priority(&self, sys: SystemIrq) -> IrqPrio {
        self.system_priority[sys.index()].load(Ordering::SeqCst)
    }

    pub fn controller_inits(&self) -> u32 {
        self.controller_inits.load(Ordering::SeqCst)
    }

    /// Reload value if SysTick is running
    pub fn systick_reload(&self) -> Option<u32> {
        if self.systick_running.load(Ordering::SeqCst) {
            Some(self.systick_reload.load(Ordering::SeqCst))
        } else {
            None
        }
    }

    /// Number of register writes performed so far
    pub fn hw_writes(&self) -> u32 {
        self.hw_writes.load(Ordering::SeqCst)
    }

    #[inline]
    fn touch(&self) {
        self.hw_writes.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    fn now(&self) -> u32 {
        let step = self.cycle_step.load(Ordering::SeqCst);
        self.cycles.fetch_add(step, Ordering::SeqCst)
    }

    #[inline]
    fn since_reload(&self) -> u32 {
        self.now().wrapping_sub(self.systick_base.load(Ordering::SeqCst))
    }
}

impl Port for SimPort {
    fn irqs_enabled(&self) -> bool {
        self.irqs_enabled.load(Ordering::SeqCst)
    }

    fn irq_disable(&self) {
        self.irqs_enabled.store(false, Ordering::SeqCst);
    }

    fn irq_enable(&self) {
        self.irqs_enabled.store(true, Ordering::SeqCst);
    }

    fn in_isr(&self) -> bool {
        self.in_isr.load(Ordering::SeqCst)
    }

    fn init_controller(&self, external_count: usize) {
        for irq in 0..external_count.min(CFG_MAX_EXTERNAL_IRQS) {
            self.enabled[irq].store(false, Ordering::SeqCst);
            self.pending[irq].store(false, Ordering::SeqCst);
            self.priority[irq].store(CFG_IRQ_PRIO_MAX, Ordering::SeqCst);
        }
        self.controller_inits.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    fn enable_irq(&self, irq: u16) {
        self.enabled[irq as usize].store(true, Ordering::SeqCst);
        self.touch();
    }

    fn disable_irq(&self, irq: u16) {
        self.enabled[irq as usize].store(false, Ordering::SeqCst);
        self.touch();
    }

    fn set_irq_priority(&self, irq: u16, prio: IrqPrio) {
        self.priority[irq as usize].store(prio, Ordering::SeqCst);
        self.touch();
    }

    fn set_system_priority(&self, sys: SystemIrq, prio: IrqPrio) {
        self.system_priority[sys.index()].store(prio, Ordering::SeqCst);
        self.touch();
    }

    fn is_irq_pending(&self, irq: u16) -> bool {
        self.pending[irq as usize].load(Ordering::SeqCst)
    }

    fn is_system_pending(&self, sys: SystemIrq) -> bool {
        self.system_pending[sys.index()].load(Ordering::SeqCst)
    }

    fn pend_irq(&self, irq: u16) {
        self.pending[irq as usize].store(true, Ordering::SeqCst);
        self.touch();
    }

    fn unpend_irq(&self, irq: u16) {
        self.pending[irq as usize].store(false, Ordering::SeqCst);
        self.touch();
    }

    fn cycle_count(&self) -> u32 {
        self.now()
    }

    fn core_clock_hz(&self) -> u32 {
        self.core_clock_hz
    }

    fn systick_start(&self, reload: u32) {
        self.systick_reload.store(reload, Ordering::SeqCst);
        self.systick_base.store(self.cycles.load(Ordering::SeqCst), Ordering::SeqCst);
        self.systick_running.store(true, Ordering::SeqCst);
        self.touch();
    }

    fn systick_stop(&self) {
        self.systick_running.store(false, Ordering::SeqCst);
        self.touch();
    }

    fn systick_elapsed(&self) -> u32 {
        if !self.systick_running.load(Ordering::SeqCst) {
            return 0;
        }
        let period = self.systick_reload.load(Ordering::SeqCst).wrapping_add(1);
        self.since_reload() % period
    }

    fn systick_wrapped(&self) -> bool {
        self.systick_running.load(Ordering::SeqCst)
            && self.since_reload() > self.systick_reload.load(Ordering::SeqCst)
    }
}
