//! Critical section handling for DSRTOS
//!
//! Nestable global interrupt masking. `disable()` masks delivery and bumps the
//! nesting depth; `restore()` drops it again and only unmasks once the depth
//! is back to zero and interrupts were enabled before the outermost
//! `disable()`. Every shared table in the registry and the timer scheduler is
//! mutated under this mask.

use portable_atomic::{AtomicU32, Ordering};

use crate::port::Port;

/// Mask state captured by [`CriticalSectionManager::disable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the state must be handed back to `restore`"]
pub struct IrqState {
    was_enabled: bool,
}

impl IrqState {
    /// Whether interrupts were delivered before the matching `disable()`
    #[inline(always)]
    pub fn was_enabled(self) -> bool {
        self.was_enabled
    }
}

/// Process-wide nestable interrupt mask
pub struct CriticalSectionManager<'a, P: Port> {
    port: &'a P,
    depth: AtomicU32,
}

impl<'a, P: Port> CriticalSectionManager<'a, P> {
    pub const fn new(port: &'a P) -> Self {
        Self {
            port,
            depth: AtomicU32::new(0),
        }
    }

    /// Mask all maskable interrupts and return the previous state
    #[inline]
    pub fn disable(&self) -> IrqState {
        let was_enabled = self.port.irqs_enabled();
        self.port.irq_disable();

        // Masked from here on, nothing can interleave with the update
        let depth = self.depth.load(Ordering::Relaxed);
        self.depth.store(depth.saturating_add(1), Ordering::Relaxed);

        IrqState { was_enabled }
    }

    /// Undo one `disable()`
    ///
    /// Calls must alternate strictly with `disable()`; a stray `restore()`
    /// at depth zero only applies `state`.
    #[inline]
    pub fn restore(&self, state: IrqState) {
        let depth = self.depth.load(Ordering::Relaxed).saturating_sub(1);
        self.depth.store(depth, Ordering::Relaxed);

        if depth == 0 && state.was_enabled {
            self.port.irq_enable();
        }
    }

    /// Current nesting depth
    #[inline(always)]
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    /// Check if we're currently in a critical section
    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    /// Enter a critical section.
    ///
    /// Returns a guard that will restore interrupt state when dropped.
    #[inline]
    pub fn enter(&self) -> CriticalSection<'_, 'a, P> {
        CriticalSection {
            manager: self,
            state: self.disable(),
        }
    }

    /// Execute a closure with interrupts disabled
    ///
    /// The closure receives a reference to the critical section guard,
    /// which can be used to access [`CsCell`](crate::core::cs_cell::CsCell) protected data.
    #[inline]
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&CriticalSection<'_, 'a, P>) -> R,
    {
        let cs = self.enter();
        f(&cs)
    }

    pub(crate) fn port(&self) -> &'a P {
        self.port
    }
}

/// RAII guard for critical sections
///
/// Interrupts stay masked while the guard lives; dropping it performs the
/// matching `restore()` on every exit path.
pub struct CriticalSection<'m, 'a, P: Port> {
    manager: &'m CriticalSectionManager<'a, P>,
    state: IrqState,
}

impl<P: Port> CriticalSection<'_, '_, P> {
    /// State captured on entry
    #[inline(always)]
    pub fn state(&self) -> IrqState {
        self.state
    }
}

impl<P: Port> Drop for CriticalSection<'_, '_, P> {
    #[inline(always)]
    fn drop(&mut self) {
        self.manager.restore(self.state);
    }
}
