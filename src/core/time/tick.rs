//! Tick processing
//!
//! Runs inside the SysTick interrupt. Each slot is handled in index order:
//! count down under the lock, run the callback unlocked, then reload or
//! retire the slot under the lock again.

use crate::irq::IrqHandler;
use crate::port::{cycles_to_us, Port};
use crate::types::{Context, IrqNum, TimerId};

use super::{TimerCallback, TimerScheduler, TICK_PERIOD_US};
use crate::config::CFG_TIMER_SLOTS;

impl<'a, P: Port> TimerScheduler<'a, P> {
    /// Account one SysTick period
    ///
    /// Normally reached through the interrupt dispatcher; calls before
    /// `init()` are ignored.
    pub fn on_tick(&self) {
        if !self.is_initialized() {
            return;
        }

        self.irq.critical().with(|cs| {
            let table = self.table.get(cs);
            table.tick_count = table.tick_count.wrapping_add(1);
            if table.tick_count == 0 {
                table.tick_overflows = table.tick_overflows.wrapping_add(1);
            }
            table.counters.systick_interrupts = table.counters.systick_interrupts.wrapping_add(1);
        });

        self.process(TICK_PERIOD_US);
    }

    /// Count every active slot down by `elapsed_us` and fire the expired ones
    fn process(&self, elapsed_us: u32) {
        for id in 0..CFG_TIMER_SLOTS as TimerId {
            if let Some((callback, context, epoch)) = self.count_down(id, elapsed_us) {
                self.fire(id, callback, context, epoch);
            }
        }
    }

    fn count_down(&self, id: TimerId, elapsed_us: u32) -> Option<(&'a dyn TimerCallback, Context, u32)> {
        self.irq.critical().with(|cs| {
            let desc = &mut self.table.get(cs).slots[id as usize];
            if !desc.is_active() {
                return None;
            }

            desc.remaining_us = desc.remaining_us.saturating_sub(elapsed_us);
            if desc.remaining_us == 0 {
                desc.callback.map(|cb| (cb, desc.context, desc.epoch))
            } else {
                None
            }
        })
    }

    fn fire(&self, id: TimerId, callback: &'a dyn TimerCallback, context: Context, epoch: u32) {
        let port = self.irq.port();
        let start = port.cycle_count();
        callback.invoke(id, context);
        let elapsed_us = cycles_to_us(port.cycle_count().wrapping_sub(start), port.core_clock_hz());

        self.irq.critical().with(|cs| {
            let table = self.table.get(cs);
            table.counters.record_callback(elapsed_us);

            let desc = &mut table.slots[id as usize];
            // Re-registered or released by the callback
            if desc.epoch != epoch || !desc.is_active() {
                return;
            }

            desc.call_count = desc.call_count.wrapping_add(1);
            // A non-zero countdown means the callback restarted its own timer
            if desc.remaining_us > 0 {
                return;
            }

            if desc.is_periodic() {
                desc.remaining_us = desc.period_us;
            } else {
                desc.clear();
                table.active_count = table.active_count.saturating_sub(1);
            }
        });
    }
}

impl<'a, P: Port> IrqHandler for TimerScheduler<'a, P> {
    fn invoke(&self, _irq: IrqNum, _context: Context) {
        self.on_tick();
    }
}
