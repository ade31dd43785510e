//! Critical section protected cell
//!
//! Zero-overhead wrapper for the descriptor and timer tables, which are
//! shared between thread code and interrupt handlers.

use core::cell::UnsafeCell;

use crate::critical::CriticalSection;
use crate::port::Port;

/// A cell that can only be accessed within a critical section.
///
/// Callers must not hold the returned reference across a call that enters
/// the same cell again (handler or callback invocation in particular).
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Get a mutable reference to the inner value
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'c, P: Port>(&'c self, _cs: &'c CriticalSection<'_, '_, P>) -> &'c mut T {
        unsafe { &mut *self.0.get() }
    }
}
