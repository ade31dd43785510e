//! Compile-time configuration for the DSRTOS hardware core
//!
//! These constants control table sizes, priority ranges and timing limits.
//! Values match the STM32F407 (Cortex-M4, 82 external IRQ lines, 4 NVIC priority bits).

/// Number of external interrupt lines managed by the registry
pub const CFG_MAX_EXTERNAL_IRQS: usize = 82;

/// Number of implemented NVIC priority bits
pub const CFG_NVIC_PRIO_BITS: u8 = 4;

/// Number of interrupt priority levels
pub const CFG_IRQ_PRIO_LEVELS: u8 = 1 << CFG_NVIC_PRIO_BITS;

/// Lowest (numerically largest) interrupt priority
pub const CFG_IRQ_PRIO_MAX: u8 = CFG_IRQ_PRIO_LEVELS - 1;

/// Suggested priority for ordinary peripheral handlers
pub const CFG_IRQ_PRIO_DEFAULT: u8 = 10;

/// Priorities at or above this level (numerically <=) are considered critical
pub const CFG_IRQ_PRIO_CRITICAL: u8 = 5;

/// SysTick priority assigned at init
pub const CFG_SYSTICK_PRIO: u8 = CFG_IRQ_PRIO_MAX;

/// PendSV priority assigned at init
pub const CFG_PENDSV_PRIO: u8 = CFG_IRQ_PRIO_MAX;

/// SVCall priority assigned at init
pub const CFG_SVCALL_PRIO: u8 = 0;

/// Size of the dedicated interrupt stack in bytes
pub const CFG_IRQ_STACK_SIZE: usize = 2048;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Number of software timer slots
pub const CFG_TIMER_SLOTS: usize = 16;

/// Shortest accepted software timer period
pub const CFG_TIMER_MIN_PERIOD_US: u32 = 100;

/// Longest accepted busy delay (one hour)
pub const CFG_TIMER_MAX_DELAY_US: u32 = 3_600_000_000;

/// Largest reload value the 24-bit SysTick counter accepts
pub const CFG_SYSTICK_RELOAD_MAX: u32 = 0x00FF_FFFF;
