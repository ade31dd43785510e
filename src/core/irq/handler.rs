//! Interrupt descriptors and the handler capability

use crate::config::CFG_IRQ_PRIO_MAX;
use crate::types::{Context, IrqFlags, IrqNum, IrqPrio};

/// Something that can service an interrupt
///
/// Any `Fn(IrqNum, Context) + Sync` closure or function is a handler.
/// Handlers run in interrupt context: keep them short and never block.
pub trait IrqHandler: Sync {
    fn invoke(&self, irq: IrqNum, context: Context);
}

impl<F> IrqHandler for F
where
    F: Fn(IrqNum, Context) + Sync,
{
    #[inline(always)]
    fn invoke(&self, irq: IrqNum, context: Context) {
        self(irq, context)
    }
}

/// One registry slot
#[derive(Clone, Copy)]
pub(crate) struct IrqDescriptor<'a> {
    pub(crate) handler: Option<&'a dyn IrqHandler>,
    pub(crate) context: Context,
    pub(crate) priority: IrqPrio,
    pub(crate) flags: IrqFlags,
    pub(crate) call_count: u32,
    pub(crate) total_execution_time_us: u64,
    /// Bumped whenever the slot is (re)registered or vacated
    pub(crate) epoch: u32,
}

impl<'a> IrqDescriptor<'a> {
    /// Unregistered slot at the lowest priority
    pub(crate) const EMPTY: Self = Self::vacant(CFG_IRQ_PRIO_MAX);

    pub(crate) const fn vacant(priority: IrqPrio) -> Self {
        Self {
            handler: None,
            context: Context::NONE,
            priority,
            flags: IrqFlags::empty(),
            call_count: 0,
            total_execution_time_us: 0,
            epoch: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn is_registered(&self) -> bool {
        self.flags.contains(IrqFlags::REGISTERED)
    }

    pub(crate) fn install(&mut self, handler: &'a dyn IrqHandler, context: Context, priority: IrqPrio) {
        *self = Self {
            handler: Some(handler),
            context,
            priority,
            flags: IrqFlags::REGISTERED,
            call_count: 0,
            total_execution_time_us: 0,
            epoch: self.epoch.wrapping_add(1),
        };
    }

    /// Drop the registration, keeping the slot's epoch moving
    pub(crate) fn vacate(&mut self, priority: IrqPrio) {
        *self = Self {
            epoch: self.epoch.wrapping_add(1),
            ..Self::vacant(priority)
        };
    }

    /// Handler, context and epoch if the slot can be dispatched
    #[inline]
    pub(crate) fn target(&self) -> Option<(&'a dyn IrqHandler, Context, u32)> {
        if self.is_registered() {
            self.handler.map(|h| (h, self.context, self.epoch))
        } else {
            None
        }
    }

    /// Whether this is still the registration seen at `epoch`
    #[inline]
    pub(crate) fn is_same_registration(&self, epoch: u32) -> bool {
        self.is_registered() && self.epoch == epoch
    }

    pub(crate) fn info(&self) -> IrqInfo {
        IrqInfo {
            priority: self.priority,
            flags: self.flags,
            call_count: self.call_count,
            total_execution_time_us: self.total_execution_time_us,
        }
    }

    pub(crate) fn record(&mut self, execution_time_us: u32) {
        self.call_count = self.call_count.wrapping_add(1);
        self.total_execution_time_us = self
            .total_execution_time_us
            .wrapping_add(execution_time_us as u64);
    }
}

/// Read-only snapshot of one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqInfo {
    pub priority: IrqPrio,
    pub flags: IrqFlags,
    pub call_count: u32,
    pub total_execution_time_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: IrqNum, _: Context) {}

    #[test]
    fn test_install_and_vacate_bump_epoch() {
        let handler: fn(IrqNum, Context) = nop;
        let mut desc = IrqDescriptor::EMPTY;

        desc.install(&handler, Context::NONE, 4);
        let (_, _, epoch) = desc.target().unwrap();
        assert!(desc.is_same_registration(epoch));

        desc.vacate(CFG_IRQ_PRIO_MAX);
        assert!(desc.target().is_none());
        assert!(!desc.is_same_registration(epoch));

        desc.install(&handler, Context::NONE, 4);
        assert!(!desc.is_same_registration(epoch));
        assert_eq!(desc.epoch, epoch + 2);
    }
}
