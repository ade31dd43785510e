//! Tick counter, monotonic time and busy delays

use crate::config::{CFG_TICK_RATE_HZ, CFG_TIMER_MAX_DELAY_US};
use crate::error::{OsError, OsResult};
use crate::port::{cycles_to_us, Port};

use super::{TimerScheduler, TICK_PERIOD_US};

/// Convert a tick count to milliseconds, saturating at `u64::MAX`
#[inline]
pub const fn ticks_to_ms(ticks: u64) -> u64 {
    saturate(ticks as u128 * 1000 / CFG_TICK_RATE_HZ as u128)
}

/// Convert milliseconds to ticks, rounding down and saturating at `u64::MAX`
#[inline]
pub const fn ms_to_ticks(ms: u64) -> u64 {
    saturate(ms as u128 * CFG_TICK_RATE_HZ as u128 / 1000)
}

#[inline(always)]
const fn saturate(v: u128) -> u64 {
    if v > u64::MAX as u128 {
        u64::MAX
    } else {
        v as u64
    }
}

impl<'a, P: Port> TimerScheduler<'a, P> {
    /// Ticks since `init()`
    pub fn ticks(&self) -> u64 {
        self.irq.critical().with(|cs| self.table.get(cs).tick_count)
    }

    /// Number of times the 64-bit tick counter wrapped
    pub fn tick_overflows(&self) -> u32 {
        self.irq.critical().with(|cs| self.table.get(cs).tick_overflows)
    }

    /// Milliseconds since `init()`, tick resolution
    pub fn milliseconds(&self) -> u64 {
        ticks_to_ms(self.ticks())
    }

    /// Microseconds since `init()`
    ///
    /// Interpolates inside the current tick from the SysTick counter. A wrap
    /// that has not been serviced yet is counted as an extra tick.
    pub fn microseconds(&self) -> u64 {
        let port = self.irq.port();

        self.irq.critical().with(|cs| {
            let table = self.table.get(cs);
            let mut ticks = table.tick_count;
            let mut elapsed = port.systick_elapsed();

            if port.systick_wrapped() {
                ticks = ticks.wrapping_add(1);
                elapsed = port.systick_elapsed();
            }

            let sub_tick = cycles_to_us(elapsed.min(table.reload), table.cpu_hz);
            ticks
                .wrapping_mul(TICK_PERIOD_US as u64)
                .wrapping_add(sub_tick as u64)
        })
    }

    /// Spin for at least `us` microseconds
    ///
    /// Needs the tick interrupt to keep running: never call with interrupts
    /// masked or from a handler at or above the SysTick priority.
    ///
    /// # Returns
    /// * `Err(OsError::NotInitialized)` - Timer subsystem not ready
    /// * `Err(OsError::InvalidParam)` - More than one hour requested
    pub fn delay_us(&self, us: u32) -> OsResult<()> {
        self.ensure_ready()?;
        if us > CFG_TIMER_MAX_DELAY_US {
            return Err(OsError::InvalidParam);
        }
        if us == 0 {
            return Ok(());
        }

        let start = self.microseconds();
        while self.microseconds().wrapping_sub(start) < us as u64 {
            core::hint::spin_loop();
        }
        Ok(())
    }

    /// Spin for at least `ms` milliseconds
    pub fn delay_ms(&self, ms: u32) -> OsResult<()> {
        self.ensure_ready()?;
        let us = ms.checked_mul(1000).ok_or(OsError::InvalidParam)?;
        self.delay_us(us)
    }
}
