//! Interrupt dispatch
//!
//! Entry point for every vector. The table lock is taken twice per event,
//! once to resolve the handler and once to book its execution time, so
//! higher-priority interrupts may preempt a running handler and nest.

use crate::port::{cycles_to_us, Port};
use crate::types::{IrqFlags, IrqKind, IrqNum};
use crate::warn;

use super::InterruptController;

impl<'a, P: Port> InterruptController<'a, P> {
    /// Route one interrupt event to its registered handler
    ///
    /// Call from each vector (or from a shared default handler that reads
    /// the active vector). Events arriving before [`init`](Self::init) are
    /// dropped.
    ///
    /// An event without a registered handler counts as spurious and, for an
    /// external line, masks that line until it is enabled again.
    pub fn dispatch(&self, irq: IrqNum) {
        if !self.is_initialized() {
            return;
        }
        let Some(kind) = irq.kind() else {
            return;
        };

        let target = self.cs.with(|cs| {
            let table = self.table.get(cs);
            table.stats.enter();

            let desc = table.slot(kind);
            let target = desc.target();
            if target.is_some() {
                desc.flags.insert(IrqFlags::ACTIVE);
                desc.flags.remove(IrqFlags::PENDING);
            }
            target
        });

        let Some((handler, context, epoch)) = target else {
            self.spurious(irq, kind);
            return;
        };

        let port = self.port();
        let start = port.cycle_count();
        handler.invoke(irq, context);
        let elapsed_us = cycles_to_us(port.cycle_count().wrapping_sub(start), port.core_clock_hz());

        self.cs.with(|cs| {
            let table = self.table.get(cs);
            let desc = table.slot(kind);
            // The handler may have unregistered or replaced its own slot
            if desc.is_same_registration(epoch) {
                desc.flags.remove(IrqFlags::ACTIVE);
                desc.record(elapsed_us);
            }
            table.stats.record(elapsed_us);
            table.stats.leave();
        });
    }

    fn spurious(&self, irq: IrqNum, kind: IrqKind) {
        self.cs.with(|cs| {
            let table = self.table.get(cs);
            table.stats.record_spurious();

            if let IrqKind::External(n) = kind {
                self.port().disable_irq(n);
                table
                    .slot(kind)
                    .flags
                    .remove(IrqFlags::ENABLED | IrqFlags::PENDING);
            }
            table.stats.leave();
        });

        warn!("irq: spurious interrupt {=i16}", irq.0);
    }
}
