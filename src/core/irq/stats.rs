//! Interrupt statistics and controller capabilities

use crate::config::{CFG_IRQ_PRIO_LEVELS, CFG_IRQ_STACK_SIZE, CFG_MAX_EXTERNAL_IRQS, CFG_NVIC_PRIO_BITS};

/// Aggregate dispatcher counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqStats {
    /// Every delivered event, spurious ones included
    pub total_interrupts: u32,
    /// Events with no registered handler
    pub spurious_interrupts: u32,
    pub max_nesting_level: u32,
    pub current_nesting_level: u32,
    /// Time spent in handlers
    pub total_irq_time_us: u64,
    /// Longest single handler execution
    pub max_irq_latency_us: u32,
}

impl IrqStats {
    pub const fn new() -> Self {
        Self {
            total_interrupts: 0,
            spurious_interrupts: 0,
            max_nesting_level: 0,
            current_nesting_level: 0,
            total_irq_time_us: 0,
            max_irq_latency_us: 0,
        }
    }

    #[inline]
    pub(crate) fn enter(&mut self) {
        self.current_nesting_level = self.current_nesting_level.saturating_add(1);
        if self.current_nesting_level > self.max_nesting_level {
            self.max_nesting_level = self.current_nesting_level;
        }
    }

    #[inline]
    pub(crate) fn leave(&mut self) {
        self.current_nesting_level = self.current_nesting_level.saturating_sub(1);
    }

    pub(crate) fn record(&mut self, execution_time_us: u32) {
        self.total_interrupts = self.total_interrupts.wrapping_add(1);
        self.total_irq_time_us = self.total_irq_time_us.wrapping_add(execution_time_us as u64);
        if execution_time_us > self.max_irq_latency_us {
            self.max_irq_latency_us = execution_time_us;
        }
    }

    pub(crate) fn record_spurious(&mut self) {
        self.total_interrupts = self.total_interrupts.wrapping_add(1);
        self.spurious_interrupts = self.spurious_interrupts.wrapping_add(1);
    }

    /// Clear counters but keep the live nesting depth
    pub(crate) fn reset(&mut self) {
        *self = Self {
            current_nesting_level: self.current_nesting_level,
            max_nesting_level: self.current_nesting_level,
            ..Self::new()
        };
    }
}

/// Static description of the interrupt controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqCapabilities {
    pub max_external_irqs: u16,
    pub priority_levels: u8,
    pub priority_bits: u8,
    pub nested_interrupts: bool,
    pub priority_grouping: bool,
    pub stack_size: u32,
}

impl IrqCapabilities {
    pub const fn current() -> Self {
        Self {
            max_external_irqs: CFG_MAX_EXTERNAL_IRQS as u16,
            priority_levels: CFG_IRQ_PRIO_LEVELS,
            priority_bits: CFG_NVIC_PRIO_BITS,
            nested_interrupts: true,
            priority_grouping: true,
            stack_size: CFG_IRQ_STACK_SIZE as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_tracks_max() {
        let mut stats = IrqStats::new();
        stats.enter();
        stats.enter();
        stats.leave();
        stats.enter();
        stats.enter();
        assert_eq!(stats.current_nesting_level, 3);
        assert_eq!(stats.max_nesting_level, 3);

        stats.leave();
        stats.leave();
        stats.leave();
        stats.leave();
        assert_eq!(stats.current_nesting_level, 0);
        assert_eq!(stats.max_nesting_level, 3);
    }

    #[test]
    fn test_reset_keeps_live_depth() {
        let mut stats = IrqStats::new();
        stats.enter();
        stats.enter();
        stats.record(40);
        stats.record_spurious();
        stats.leave();

        stats.reset();
        assert_eq!(stats.current_nesting_level, 1);
        assert_eq!(stats.max_nesting_level, 1);
        assert_eq!(stats.total_interrupts, 0);
        assert_eq!(stats.max_irq_latency_us, 0);
    }
}
