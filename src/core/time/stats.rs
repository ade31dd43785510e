//! Timer statistics and limits

use crate::config::{
    CFG_TICK_RATE_HZ, CFG_TIMER_MAX_DELAY_US, CFG_TIMER_MIN_PERIOD_US, CFG_TIMER_SLOTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerStats {
    pub system_tick_count: u64,
    pub systick_interrupts: u32,
    pub callback_executions: u32,
    pub max_callback_time_us: u32,
    pub active_timers: u8,
    pub cpu_frequency_hz: u32,
    pub systick_frequency_hz: u32,
}

/// Counters kept alongside the timer table
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TimerCounters {
    pub(crate) systick_interrupts: u32,
    pub(crate) callback_executions: u32,
    pub(crate) max_callback_time_us: u32,
}

impl TimerCounters {
    pub(crate) const fn new() -> Self {
        Self {
            systick_interrupts: 0,
            callback_executions: 0,
            max_callback_time_us: 0,
        }
    }

    pub(crate) fn record_callback(&mut self, execution_time_us: u32) {
        self.callback_executions = self.callback_executions.wrapping_add(1);
        self.max_callback_time_us = self.max_callback_time_us.max(execution_time_us);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCapabilities {
    pub max_timers: u8,
    pub min_period_us: u32,
    pub max_delay_us: u32,
    pub tick_rate_hz: u32,
    /// Granularity of [`microseconds`](super::TimerScheduler::microseconds)
    pub resolution_us: u32,
    pub periodic_timers: bool,
    pub oneshot_timers: bool,
}

impl TimerCapabilities {
    pub const fn current() -> Self {
        Self {
            max_timers: CFG_TIMER_SLOTS as u8,
            min_period_us: CFG_TIMER_MIN_PERIOD_US,
            max_delay_us: CFG_TIMER_MAX_DELAY_US,
            tick_rate_hz: CFG_TICK_RATE_HZ,
            resolution_us: 1,
            periodic_timers: true,
            oneshot_timers: true,
        }
    }
}
