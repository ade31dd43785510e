//! Core type definitions for DSRTOS
//!
//! These types provide strong typing for interrupt and timer primitives.

use bitflags::bitflags;

use crate::config::{CFG_IRQ_PRIO_MAX, CFG_MAX_EXTERNAL_IRQS, CFG_TIMER_SLOTS};

/// Interrupt priority (0 = highest priority)
pub type IrqPrio = u8;

/// Software timer slot index
pub type TimerId = u8;

/// Interrupt identifier as delivered by the vector table
///
/// Non-negative values address external lines. The three system exceptions
/// use the Cortex-M IRQn numbering (`exception number - 16`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub struct IrqNum(pub i16);

impl IrqNum {
    /// Periodic tick
    pub const SYSTICK: IrqNum = IrqNum(-1);
    /// Context-switch request
    pub const PENDSV: IrqNum = IrqNum(-2);
    /// Supervisor call
    pub const SVCALL: IrqNum = IrqNum(-5);

    /// Resolve the identifier into an external line or a system slot
    pub fn kind(self) -> Option<IrqKind> {
        match self.0 {
            n if n >= 0 && (n as usize) < CFG_MAX_EXTERNAL_IRQS => Some(IrqKind::External(n as u16)),
            -1 => Some(IrqKind::System(SystemIrq::SysTick)),
            -2 => Some(IrqKind::System(SystemIrq::PendSv)),
            -5 => Some(IrqKind::System(SystemIrq::SvCall)),
            _ => None,
        }
    }

    /// Whether the identifier addresses an external line
    #[inline]
    pub fn is_external(self) -> bool {
        matches!(self.kind(), Some(IrqKind::External(_)))
    }
}

impl From<i16> for IrqNum {
    fn from(n: i16) -> Self {
        IrqNum(n)
    }
}

impl From<SystemIrq> for IrqNum {
    fn from(sys: SystemIrq) -> Self {
        match sys {
            SystemIrq::SysTick => IrqNum::SYSTICK,
            SystemIrq::PendSv => IrqNum::PENDSV,
            SystemIrq::SvCall => IrqNum::SVCALL,
        }
    }
}

/// Resolved interrupt identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqKind {
    /// NVIC line number
    External(u16),
    /// One of the named system exceptions
    System(SystemIrq),
}

/// Named system exception slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[repr(u8)]
pub enum SystemIrq {
    SysTick = 0,
    PendSv = 1,
    SvCall = 2,
}

impl SystemIrq {
    pub const COUNT: usize = 3;

    #[inline(always)]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Validate a priority value against the implemented NVIC levels
#[inline]
pub fn is_valid_prio(prio: IrqPrio) -> bool {
    prio <= CFG_IRQ_PRIO_MAX
}

/// Validate a timer slot index
#[inline]
pub fn is_valid_timer(id: TimerId) -> bool {
    (id as usize) < CFG_TIMER_SLOTS
}

/// Lifecycle of a subsystem singleton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InitState {
    Uninitialized = 0,
    Ready = 1,
}

impl InitState {
    #[inline]
    pub(crate) fn from_raw(raw: u8) -> Self {
        if raw == InitState::Ready as u8 {
            InitState::Ready
        } else {
            InitState::Uninitialized
        }
    }
}

bitflags! {
    /// Interrupt descriptor status
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IrqFlags: u8 {
        const ENABLED = 0x01;
        const PENDING = 0x02;
        const ACTIVE = 0x04;
        const REGISTERED = 0x08;
    }
}

bitflags! {
    /// Software timer slot status
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TimerFlags: u8 {
        const ACTIVE = 0x01;
        const PERIODIC = 0x02;
        const ONESHOT = 0x04;
    }
}

/// Opaque registrant-owned handle passed back to handlers and callbacks
///
/// The descriptor tables only borrow it; the registrant must keep the
/// pointee alive for as long as the registration exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context(*const ());

impl Context {
    /// No context
    pub const NONE: Context = Context(core::ptr::null());

    /// Wrap a reference to registrant-owned data
    #[inline]
    pub const fn new<T>(data: &T) -> Self {
        Context(data as *const T as *const ())
    }

    /// Wrap a raw address (e.g. a peripheral block)
    #[inline]
    pub const fn from_ptr(ptr: *const ()) -> Self {
        Context(ptr)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0.is_null()
    }

    #[inline]
    pub fn as_ptr(self) -> *const () {
        self.0
    }

    /// Recover the registrant's data
    ///
    /// # Safety
    /// The context must have been created from a `&T` that is still alive.
    #[inline]
    pub unsafe fn cast<'c, T>(self) -> Option<&'c T> {
        unsafe { (self.0 as *const T).as_ref() }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::NONE
    }
}
