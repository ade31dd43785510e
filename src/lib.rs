//! DSRTOS hardware core in Rust
//!
//! The interrupt and timing layer of a single-core Cortex-M kernel:
//! - Interrupt registry with per-line handlers, priorities and statistics
//! - Dispatcher with nesting and spurious-interrupt handling
//! - Nestable critical sections
//! - Tick-driven periodic and one-shot software timers, busy delays
//!
//! Hardware access goes through [`port::Port`]; on the host the simulated
//! port lets the whole core run under `cargo test`.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::critical;
pub use crate::core::critical::{CriticalSection, CriticalSectionManager, IrqState};
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::irq;
pub use crate::core::irq::{InterruptController, IrqConfig, IrqHandler};
pub use crate::core::time;
pub use crate::core::time::{TimerCallback, TimerConfig, TimerScheduler};
pub use crate::core::types;
pub use crate::core::types::*;

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
