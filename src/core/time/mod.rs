//! Time management module
//!
//! Software timers counted down by the periodic SysTick interrupt, a 64-bit
//! tick counter and busy-wait delays. The scheduler registers itself as the
//! SysTick handler of an [`InterruptController`], so the controller has to be
//! initialized first:
//!
//! ```ignore
//! static TIMERS: TimerScheduler<'static, CortexM4> = TimerScheduler::new(&IRQ);
//!
//! IRQ.init()?;
//! TIMERS.init()?;
//! let id = TIMERS.register_periodic(&blink, Context::NONE, 500_000)?;
//! ```

mod clock;
mod slot;
mod stats;
mod tick;

pub use clock::{ms_to_ticks, ticks_to_ms};
pub use slot::{TimerCallback, TimerConfig, TimerInfo};
pub use stats::{TimerCapabilities, TimerStats};

use portable_atomic::{AtomicU8, Ordering};
use slot::TimerDescriptor;
use stats::TimerCounters;

use crate::config::{
    CFG_SYSTICK_PRIO, CFG_SYSTICK_RELOAD_MAX, CFG_TICK_RATE_HZ, CFG_TIMER_MIN_PERIOD_US,
    CFG_TIMER_SLOTS,
};
use crate::core::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::irq::InterruptController;
use crate::port::Port;
use crate::types::{is_valid_timer, Context, InitState, IrqNum, TimerId};
use crate::{debug, info, warn};

pub(crate) struct TimerTable<'a> {
    slots: [TimerDescriptor<'a>; CFG_TIMER_SLOTS],
    active_count: u8,
    tick_count: u64,
    tick_overflows: u32,
    reload: u32,
    cpu_hz: u32,
    counters: TimerCounters,
}

impl<'a> TimerTable<'a> {
    const fn new() -> Self {
        Self {
            slots: [TimerDescriptor::EMPTY; CFG_TIMER_SLOTS],
            active_count: 0,
            tick_count: 0,
            tick_overflows: 0,
            reload: 0,
            cpu_hz: 0,
            counters: TimerCounters::new(),
        }
    }

    fn slot(&mut self, id: TimerId) -> OsResult<&mut TimerDescriptor<'a>> {
        self.slots.get_mut(id as usize).ok_or(OsError::InvalidParam)
    }

    fn active_slot(&mut self, id: TimerId) -> OsResult<&mut TimerDescriptor<'a>> {
        let desc = self.slot(id)?;
        if desc.is_active() {
            Ok(desc)
        } else {
            Err(OsError::NotRegistered)
        }
    }
}

/// Microseconds covered by one tick
pub const TICK_PERIOD_US: u32 = 1_000_000 / CFG_TICK_RATE_HZ;

/// SysTick reload for the given clock, if it fits the 24-bit counter
pub fn systick_reload(core_clock_hz: u32) -> OsResult<u32> {
    if core_clock_hz < CFG_TICK_RATE_HZ {
        return Err(OsError::InvalidParam);
    }
    let reload = core_clock_hz / CFG_TICK_RATE_HZ - 1;
    if reload > CFG_SYSTICK_RELOAD_MAX {
        return Err(OsError::InvalidParam);
    }
    Ok(reload)
}

fn check_period(period_us: u32) -> OsResult<()> {
    if period_us < CFG_TIMER_MIN_PERIOD_US {
        Err(OsError::InvalidParam)
    } else {
        Ok(())
    }
}

/// Software timer scheduler singleton
pub struct TimerScheduler<'a, P: Port> {
    irq: &'a InterruptController<'a, P>,
    state: AtomicU8,
    table: CsCell<TimerTable<'a>>,
}

impl<'a, P: Port> TimerScheduler<'a, P> {
    pub const fn new(irq: &'a InterruptController<'a, P>) -> Self {
        Self {
            irq,
            state: AtomicU8::new(InitState::Uninitialized as u8),
            table: CsCell::new(TimerTable::new()),
        }
    }

    // ============ Lifecycle ============

    /// Initialize the timer subsystem
    ///
    /// Registers the tick handler at the lowest priority, programs SysTick
    /// for [`CFG_TICK_RATE_HZ`] from the port's core clock and clears every
    /// slot. A failure after the handler was registered unregisters it again.
    ///
    /// # Returns
    /// * `Err(OsError::AlreadyInitialized)` - `init()` already succeeded
    /// * `Err(OsError::InvalidParam)` - Core clock cannot produce the tick rate
    /// * `Err(OsError::NotInitialized)` - Interrupt controller not ready
    pub fn init(&'a self) -> OsResult<()> {
        if self.is_initialized() {
            return Err(OsError::AlreadyInitialized);
        }

        let port = self.irq.port();
        let cpu_hz = port.core_clock_hz();
        let reload = systick_reload(cpu_hz)?;

        self.irq
            .register(IrqNum::SYSTICK, Some(self), Context::NONE, CFG_SYSTICK_PRIO)?;
        if let Err(err) = self.irq.enable(IrqNum::SYSTICK) {
            let _ = self.irq.unregister(IrqNum::SYSTICK);
            return Err(err);
        }

        self.irq.critical().with(|cs| {
            let table = self.table.get(cs);
            *table = TimerTable::new();
            table.reload = reload;
            table.cpu_hz = cpu_hz;

            port.systick_start(reload);
            self.state.store(InitState::Ready as u8, Ordering::Release);
        });

        info!("timer: {=u32} Hz tick, reload {=u32}", CFG_TICK_RATE_HZ, reload);
        Ok(())
    }

    /// Stop SysTick and drop every timer
    pub fn deinit(&self) -> OsResult<()> {
        self.ensure_ready()?;

        self.irq.critical().with(|cs| {
            self.irq.port().systick_stop();
            *self.table.get(cs) = TimerTable::new();
            self.state.store(InitState::Uninitialized as u8, Ordering::Release);
        });

        if self.irq.unregister(IrqNum::SYSTICK).is_err() {
            warn!("timer: tick handler was already gone");
        }
        info!("timer: shut down");
        Ok(())
    }

    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        InitState::from_raw(self.state.load(Ordering::Acquire)) == InitState::Ready
    }

    #[inline]
    fn ensure_ready(&self) -> OsResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(OsError::NotInitialized)
        }
    }

    // ============ Registration ============

    /// Register a timer in the first free slot
    ///
    /// # Arguments
    /// * `callback` - Invoked from the tick interrupt on expiry
    /// * `context` - Registrant-owned data handed back to the callback
    /// * `period_us` - Period, or the delay of a one-shot timer
    /// * `periodic` - Reload after firing instead of deactivating
    ///
    /// # Returns
    /// * `Ok(id)` - Slot the timer occupies
    /// * `Err(OsError::NullHandler)` - No callback given
    /// * `Err(OsError::InvalidParam)` - Period below the minimum or table full
    pub fn register(
        &self,
        callback: Option<&'a dyn TimerCallback>,
        context: Context,
        period_us: u32,
        periodic: bool,
    ) -> OsResult<TimerId> {
        self.ensure_ready()?;
        let callback = callback.ok_or(OsError::NullHandler)?;
        check_period(period_us)?;

        let id = self.irq.critical().with(|cs| -> OsResult<TimerId> {
            let table = self.table.get(cs);
            let id = table
                .slots
                .iter()
                .position(|slot| !slot.is_active())
                .ok_or(OsError::InvalidParam)? as TimerId;
            Self::arm_locked(table, id, callback, context, period_us, periodic)?;
            Ok(id)
        })?;

        debug!("timer: slot {=u8} armed, {=u32} us", id, period_us);
        Ok(id)
    }

    #[inline]
    pub fn register_periodic(
        &self,
        callback: &'a dyn TimerCallback,
        context: Context,
        period_us: u32,
    ) -> OsResult<TimerId> {
        self.register(Some(callback), context, period_us, true)
    }

    #[inline]
    pub fn register_oneshot(
        &self,
        callback: &'a dyn TimerCallback,
        context: Context,
        delay_us: u32,
    ) -> OsResult<TimerId> {
        self.register(Some(callback), context, delay_us, false)
    }

    /// Register a timer in a caller-chosen slot
    ///
    /// # Returns
    /// * `Err(OsError::AlreadyRegistered)` - Slot is active
    pub fn register_at(
        &self,
        id: TimerId,
        callback: Option<&'a dyn TimerCallback>,
        context: Context,
        period_us: u32,
        periodic: bool,
    ) -> OsResult<()> {
        self.ensure_ready()?;
        let callback = callback.ok_or(OsError::NullHandler)?;
        check_period(period_us)?;

        self.irq.critical().with(|cs| {
            Self::arm_locked(self.table.get(cs), id, callback, context, period_us, periodic)
        })
    }

    /// Register several slot-addressed timers, all or nothing
    pub fn register_batch(&self, configs: &[TimerConfig<'a>]) -> OsResult<()> {
        self.ensure_ready()?;
        if configs.is_empty() || configs.len() > CFG_TIMER_SLOTS {
            return Err(OsError::InvalidParam);
        }

        self.irq.critical().with(|cs| {
            let table = self.table.get(cs);

            for (done, cfg) in configs.iter().enumerate() {
                let armed = cfg
                    .callback
                    .ok_or(OsError::NullHandler)
                    .and_then(|cb| {
                        check_period(cfg.period_us)?;
                        Self::arm_locked(table, cfg.id, cb, cfg.context, cfg.period_us, cfg.periodic)
                    });

                if let Err(err) = armed {
                    for prev in configs[..done].iter().rev() {
                        let _ = Self::disarm_locked(table, prev.id);
                    }
                    return Err(err);
                }
            }
            Ok(())
        })
    }

    fn arm_locked(
        table: &mut TimerTable<'a>,
        id: TimerId,
        callback: &'a dyn TimerCallback,
        context: Context,
        period_us: u32,
        periodic: bool,
    ) -> OsResult<()> {
        let desc = table.slot(id)?;
        if desc.is_active() {
            return Err(OsError::AlreadyRegistered);
        }

        desc.arm(callback, context, period_us, periodic);
        table.active_count += 1;
        Ok(())
    }

    fn disarm_locked(table: &mut TimerTable<'a>, id: TimerId) -> OsResult<()> {
        table.active_slot(id)?.clear();
        table.active_count = table.active_count.saturating_sub(1);
        Ok(())
    }

    /// Stop a timer and free its slot
    ///
    /// Safe to call from the timer's own callback.
    pub fn unregister(&self, id: TimerId) -> OsResult<()> {
        self.ensure_ready()?;

        self.irq
            .critical()
            .with(|cs| Self::disarm_locked(self.table.get(cs), id))?;

        debug!("timer: slot {=u8} released", id);
        Ok(())
    }

    /// Replace the period of an active timer and restart its countdown
    pub fn modify_period(&self, id: TimerId, period_us: u32) -> OsResult<()> {
        self.ensure_ready()?;
        check_period(period_us)?;

        self.irq.critical().with(|cs| {
            let desc = self.table.get(cs).active_slot(id)?;
            desc.period_us = period_us;
            desc.remaining_us = period_us;
            Ok(())
        })
    }

    // ============ Queries ============

    pub fn is_active(&self, id: TimerId) -> OsResult<bool> {
        self.ensure_ready()?;
        if !is_valid_timer(id) {
            return Err(OsError::InvalidParam);
        }

        self.irq
            .critical()
            .with(|cs| Ok(self.table.get(cs).slot(id)?.is_active()))
    }

    /// Microseconds until the timer next fires
    pub fn get_remaining(&self, id: TimerId) -> OsResult<u32> {
        self.ensure_ready()?;

        self.irq
            .critical()
            .with(|cs| Ok(self.table.get(cs).active_slot(id)?.remaining_us))
    }

    /// Expirations since the timer was registered
    pub fn get_call_count(&self, id: TimerId) -> OsResult<u32> {
        self.ensure_ready()?;

        self.irq
            .critical()
            .with(|cs| Ok(self.table.get(cs).active_slot(id)?.call_count))
    }

    /// Snapshot of an active slot
    pub fn timer_info(&self, id: TimerId) -> OsResult<TimerInfo> {
        self.ensure_ready()?;

        self.irq
            .critical()
            .with(|cs| Ok(self.table.get(cs).active_slot(id)?.info()))
    }

    pub fn stats(&self) -> OsResult<TimerStats> {
        self.ensure_ready()?;

        Ok(self.irq.critical().with(|cs| {
            let table = self.table.get(cs);
            TimerStats {
                system_tick_count: table.tick_count,
                systick_interrupts: table.counters.systick_interrupts,
                callback_executions: table.counters.callback_executions,
                max_callback_time_us: table.counters.max_callback_time_us,
                active_timers: table.active_count,
                cpu_frequency_hz: table.cpu_hz,
                systick_frequency_hz: CFG_TICK_RATE_HZ,
            }
        }))
    }

    /// Clear the counters; the tick count keeps running
    pub fn reset_stats(&self) -> OsResult<()> {
        self.ensure_ready()?;

        self.irq.critical().with(|cs| {
            self.table.get(cs).counters = TimerCounters::new();
        });
        Ok(())
    }

    /// Limits of the timer subsystem; valid before init
    pub fn capabilities(&self) -> TimerCapabilities {
        TimerCapabilities::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SimPort;

    fn nop(_: TimerId, _: Context) {}

    #[test]
    fn test_reload_must_fit_systick() {
        assert_eq!(systick_reload(168_000_000), Ok(167_999));
        assert_eq!(systick_reload(16_000_000), Ok(15_999));
        assert_eq!(systick_reload(1_000), Ok(0));
        assert_eq!(systick_reload(999), Err(OsError::InvalidParam));
    }

    #[test]
    fn test_init_requires_interrupt_controller() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);

        assert_eq!(timers.init(), Err(OsError::NotInitialized));
        assert!(!timers.is_initialized());
        assert_eq!(port.systick_reload(), None);
    }

    #[test]
    fn test_init_rejects_slow_clock() {
        let port = SimPort::new(500);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        irq.init().unwrap();

        assert_eq!(timers.init(), Err(OsError::InvalidParam));
        assert_eq!(irq.get_priority(IrqNum::SYSTICK), Err(OsError::NotRegistered));
    }

    #[test]
    fn test_table_full() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        irq.init().unwrap();
        timers.init().unwrap();

        for expected in 0..CFG_TIMER_SLOTS as TimerId {
            assert_eq!(timers.register_periodic(&cb, Context::NONE, 1_000), Ok(expected));
        }
        assert_eq!(
            timers.register_periodic(&cb, Context::NONE, 1_000),
            Err(OsError::InvalidParam)
        );
        assert_eq!(timers.stats().unwrap().active_timers, CFG_TIMER_SLOTS as u8);

        timers.unregister(3).unwrap();
        assert_eq!(timers.register_oneshot(&cb, Context::NONE, 1_000), Ok(3));
    }

    #[test]
    fn test_deinit_stops_tick() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        irq.init().unwrap();
        timers.init().unwrap();
        assert_eq!(port.systick_reload(), Some(15_999));

        timers.deinit().unwrap();
        assert_eq!(port.systick_reload(), None);
        assert_eq!(irq.get_priority(IrqNum::SYSTICK), Err(OsError::NotRegistered));
        assert_eq!(timers.stats(), Err(OsError::NotInitialized));
    }
}
