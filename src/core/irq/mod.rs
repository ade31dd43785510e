//! Interrupt registry and dispatcher
//!
//! A fixed table maps every external line and the three system exceptions
//! to a handler, its context and priority. The controller is one explicitly
//! constructed value per core:
//!
//! ```ignore
//! static PORT: CortexM4 = CortexM4::new(168_000_000);
//! static IRQ: InterruptController<'static, CortexM4> = InterruptController::new(&PORT);
//!
//! IRQ.init()?;
//! IRQ.register(IrqNum(37), Some(&uart_handler), Context::NONE, 6)?;
//! IRQ.enable(IrqNum(37))?;
//! ```
//!
//! Table mutations from thread code happen under the controller's
//! [`CriticalSectionManager`]; the dispatcher holds it only around
//! bookkeeping, never while a handler runs.

mod batch;
mod dispatch;
mod handler;
mod stats;

pub use batch::IrqConfig;
pub use handler::{IrqHandler, IrqInfo};
pub use stats::{IrqCapabilities, IrqStats};

use handler::IrqDescriptor;
use portable_atomic::{AtomicU8, Ordering};

use crate::config::{
    CFG_IRQ_PRIO_MAX, CFG_MAX_EXTERNAL_IRQS, CFG_PENDSV_PRIO, CFG_SVCALL_PRIO, CFG_SYSTICK_PRIO,
};
use crate::core::cs_cell::CsCell;
use crate::critical::{CriticalSectionManager, IrqState};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::{is_valid_prio, Context, InitState, IrqFlags, IrqKind, IrqNum, IrqPrio, SystemIrq};
use crate::{debug, info};

/// Priority a system exception gets at init and after unregister
const fn system_default_prio(sys: SystemIrq) -> IrqPrio {
    match sys {
        SystemIrq::SysTick => CFG_SYSTICK_PRIO,
        SystemIrq::PendSv => CFG_PENDSV_PRIO,
        SystemIrq::SvCall => CFG_SVCALL_PRIO,
    }
}

/// Descriptor table plus aggregate statistics
pub(crate) struct IrqTable<'a> {
    external: [IrqDescriptor<'a>; CFG_MAX_EXTERNAL_IRQS],
    system: [IrqDescriptor<'a>; SystemIrq::COUNT],
    stats: IrqStats,
}

impl<'a> IrqTable<'a> {
    const fn new() -> Self {
        Self {
            external: [IrqDescriptor::EMPTY; CFG_MAX_EXTERNAL_IRQS],
            system: [
                IrqDescriptor::vacant(CFG_SYSTICK_PRIO),
                IrqDescriptor::vacant(CFG_PENDSV_PRIO),
                IrqDescriptor::vacant(CFG_SVCALL_PRIO),
            ],
            stats: IrqStats::new(),
        }
    }

    #[inline]
    fn slot(&mut self, kind: IrqKind) -> &mut IrqDescriptor<'a> {
        match kind {
            IrqKind::External(n) => &mut self.external[n as usize],
            IrqKind::System(sys) => &mut self.system[sys.index()],
        }
    }
}

/// Interrupt controller state singleton
pub struct InterruptController<'a, P: Port> {
    cs: CriticalSectionManager<'a, P>,
    state: AtomicU8,
    table: CsCell<IrqTable<'a>>,
}

impl<'a, P: Port> InterruptController<'a, P> {
    pub const fn new(port: &'a P) -> Self {
        Self {
            cs: CriticalSectionManager::new(port),
            state: AtomicU8::new(InitState::Uninitialized as u8),
            table: CsCell::new(IrqTable::new()),
        }
    }

    // ============ Lifecycle ============

    /// Initialize the interrupt controller
    ///
    /// Resets every descriptor, masks and clears all external lines and
    /// assigns the system exception priorities. Must run once during
    /// single-threaded boot, before the timer subsystem.
    ///
    /// # Returns
    /// * `Ok(())` - Controller ready
    /// * `Err(OsError::AlreadyInitialized)` - `init()` already succeeded
    pub fn init(&self) -> OsResult<()> {
        let port = self.port();

        self.cs.with(|cs| {
            if self.is_initialized() {
                return Err(OsError::AlreadyInitialized);
            }

            let table = self.table.get(cs);
            *table = IrqTable::new();

            port.init_controller(CFG_MAX_EXTERNAL_IRQS);
            for irq in 0..CFG_MAX_EXTERNAL_IRQS as u16 {
                port.set_irq_priority(irq, CFG_IRQ_PRIO_MAX);
            }
            for sys in [SystemIrq::SysTick, SystemIrq::PendSv, SystemIrq::SvCall] {
                port.set_system_priority(sys, system_default_prio(sys));
            }

            self.state.store(InitState::Ready as u8, Ordering::Release);
            Ok(())
        })?;

        info!("irq: controller ready, {=usize} external lines", CFG_MAX_EXTERNAL_IRQS);
        Ok(())
    }

    /// Tear the controller down
    ///
    /// Single-threaded counterpart of [`init`](Self::init): masks every
    /// registered line and forgets all registrations.
    pub fn deinit(&self) -> OsResult<()> {
        self.ensure_ready()?;
        let port = self.port();

        self.cs.with(|cs| {
            let table = self.table.get(cs);
            for (irq, desc) in table.external.iter().enumerate() {
                if desc.is_registered() || desc.flags.contains(IrqFlags::ENABLED) {
                    port.disable_irq(irq as u16);
                }
            }
            *table = IrqTable::new();
            self.state.store(InitState::Uninitialized as u8, Ordering::Release);
        });

        info!("irq: controller shut down");
        Ok(())
    }

    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        InitState::from_raw(self.state.load(Ordering::Acquire)) == InitState::Ready
    }

    #[inline]
    fn ensure_ready(&self) -> OsResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(OsError::NotInitialized)
        }
    }

    /// Hardware port this controller drives
    #[inline(always)]
    pub fn port(&self) -> &'a P {
        self.cs.port()
    }

    // ============ Registry ============

    /// Register an interrupt handler
    ///
    /// Installs the descriptor and programs the hardware priority. Delivery
    /// stays off until [`enable`](Self::enable).
    ///
    /// # Arguments
    /// * `irq` - External line or one of the system identifiers
    /// * `handler` - Handler invoked from [`dispatch`](Self::dispatch)
    /// * `context` - Registrant-owned data handed back to the handler
    /// * `priority` - 0 (highest) ..= 15
    ///
    /// # Returns
    /// * `Err(OsError::NotInitialized)` - Controller not initialized
    /// * `Err(OsError::NullHandler)` - No handler given
    /// * `Err(OsError::InvalidParam)` - Identifier or priority out of range
    /// * `Err(OsError::AlreadyRegistered)` - Slot is occupied
    pub fn register(
        &self,
        irq: IrqNum,
        handler: Option<&'a dyn IrqHandler>,
        context: Context,
        priority: IrqPrio,
    ) -> OsResult<()> {
        self.ensure_ready()?;
        let handler = handler.ok_or(OsError::NullHandler)?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;
        if !is_valid_prio(priority) {
            return Err(OsError::InvalidParam);
        }

        self.cs.with(|cs| self.register_locked(self.table.get(cs), kind, handler, context, priority))?;

        debug!("irq: {=i16} registered at priority {=u8}", irq.0, priority);
        Ok(())
    }

    fn register_locked(
        &self,
        table: &mut IrqTable<'a>,
        kind: IrqKind,
        handler: &'a dyn IrqHandler,
        context: Context,
        priority: IrqPrio,
    ) -> OsResult<()> {
        let desc = table.slot(kind);
        if desc.is_registered() {
            return Err(OsError::AlreadyRegistered);
        }

        desc.install(handler, context, priority);
        self.apply_priority(kind, priority);
        Ok(())
    }

    /// Remove a registration
    ///
    /// The line is masked, un-pended and dropped back to the lowest priority.
    ///
    /// # Returns
    /// * `Err(OsError::NotRegistered)` - Nothing installed for `irq`
    pub fn unregister(&self, irq: IrqNum) -> OsResult<()> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;

        self.cs.with(|cs| self.unregister_locked(self.table.get(cs), kind))?;

        debug!("irq: {=i16} unregistered", irq.0);
        Ok(())
    }

    fn unregister_locked(&self, table: &mut IrqTable<'a>, kind: IrqKind) -> OsResult<()> {
        let desc = table.slot(kind);
        if !desc.is_registered() {
            return Err(OsError::NotRegistered);
        }

        let port = self.port();
        match kind {
            IrqKind::External(n) => {
                desc.vacate(CFG_IRQ_PRIO_MAX);
                port.disable_irq(n);
                port.unpend_irq(n);
                port.set_irq_priority(n, CFG_IRQ_PRIO_MAX);
            }
            IrqKind::System(sys) => {
                desc.vacate(system_default_prio(sys));
                port.set_system_priority(sys, system_default_prio(sys));
            }
        }
        Ok(())
    }

    /// Enable delivery of a registered interrupt
    ///
    /// System exceptions are always armed once registered; enabling one only
    /// updates its status flags.
    ///
    /// # Returns
    /// * `Err(OsError::NotRegistered)` - Nothing installed for `irq`, hardware untouched
    pub fn enable(&self, irq: IrqNum) -> OsResult<()> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;

        self.cs.with(|cs| self.enable_locked(self.table.get(cs), kind))
    }

    fn enable_locked(&self, table: &mut IrqTable<'a>, kind: IrqKind) -> OsResult<()> {
        let desc = table.slot(kind);
        if !desc.is_registered() {
            return Err(OsError::NotRegistered);
        }

        if let IrqKind::External(n) = kind {
            self.port().enable_irq(n);
        }
        desc.flags.insert(IrqFlags::ENABLED);
        Ok(())
    }

    /// Disable delivery of an external interrupt
    ///
    /// Works on unregistered lines too, which is how the dispatcher silences
    /// spurious sources.
    ///
    /// # Returns
    /// * `Err(OsError::NotSupported)` - `irq` is a system exception
    pub fn disable(&self, irq: IrqNum) -> OsResult<()> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;

        self.cs.with(|cs| self.disable_locked(self.table.get(cs), kind))
    }

    fn disable_locked(&self, table: &mut IrqTable<'a>, kind: IrqKind) -> OsResult<()> {
        let IrqKind::External(n) = kind else {
            return Err(OsError::NotSupported);
        };

        self.port().disable_irq(n);
        table.slot(kind).flags.remove(IrqFlags::ENABLED);
        Ok(())
    }

    /// Change the priority of a registered interrupt
    ///
    /// Out-of-range priorities are rejected before anything changes.
    pub fn set_priority(&self, irq: IrqNum, priority: IrqPrio) -> OsResult<()> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;
        if !is_valid_prio(priority) {
            return Err(OsError::InvalidParam);
        }

        self.cs.with(|cs| {
            let desc = self.table.get(cs).slot(kind);
            if !desc.is_registered() {
                return Err(OsError::NotRegistered);
            }
            desc.priority = priority;
            self.apply_priority(kind, priority);
            Ok(())
        })
    }

    /// Priority of a registered interrupt
    pub fn get_priority(&self, irq: IrqNum) -> OsResult<IrqPrio> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;

        self.cs.with(|cs| {
            let desc = self.table.get(cs).slot(kind);
            if desc.is_registered() {
                Ok(desc.priority)
            } else {
                Err(OsError::NotRegistered)
            }
        })
    }

    fn apply_priority(&self, kind: IrqKind, priority: IrqPrio) {
        match kind {
            IrqKind::External(n) => self.port().set_irq_priority(n, priority),
            IrqKind::System(sys) => self.port().set_system_priority(sys, priority),
        }
    }

    // ============ Pending / active state ============

    /// Whether the hardware has the interrupt pending
    pub fn is_pending(&self, irq: IrqNum) -> OsResult<bool> {
        self.ensure_ready()?;
        match irq.kind().ok_or(OsError::InvalidParam)? {
            IrqKind::External(n) => Ok(self.port().is_irq_pending(n)),
            IrqKind::System(sys) => Ok(self.port().is_system_pending(sys)),
        }
    }

    /// Whether the interrupt's handler is currently executing (possibly preempted)
    pub fn is_active(&self, irq: IrqNum) -> OsResult<bool> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;

        self.cs
            .with(|cs| Ok(self.table.get(cs).slot(kind).flags.contains(IrqFlags::ACTIVE)))
    }

    /// Pend an external interrupt from software
    pub fn trigger(&self, irq: IrqNum) -> OsResult<()> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;
        let IrqKind::External(n) = kind else {
            return Err(OsError::NotSupported);
        };

        self.cs.with(|cs| {
            self.port().pend_irq(n);
            self.table.get(cs).slot(kind).flags.insert(IrqFlags::PENDING);
        });
        Ok(())
    }

    /// Clear a pending external interrupt
    pub fn clear_pending(&self, irq: IrqNum) -> OsResult<()> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;
        let IrqKind::External(n) = kind else {
            return Err(OsError::NotSupported);
        };

        self.cs.with(|cs| {
            self.port().unpend_irq(n);
            self.table.get(cs).slot(kind).flags.remove(IrqFlags::PENDING);
        });
        Ok(())
    }

    // ============ Global mask ============

    /// Critical section manager shared by every subsystem on this core
    #[inline(always)]
    pub fn critical(&self) -> &CriticalSectionManager<'a, P> {
        &self.cs
    }

    /// Globally disable interrupts, returning the previous state
    #[inline]
    pub fn global_disable(&self) -> IrqState {
        self.cs.disable()
    }

    /// Undo one [`global_disable`](Self::global_disable)
    #[inline]
    pub fn global_restore(&self, state: IrqState) {
        self.cs.restore(state)
    }

    #[inline]
    pub fn global_enabled(&self) -> bool {
        self.port().irqs_enabled()
    }

    /// Whether the caller runs in interrupt context
    #[inline]
    pub fn in_isr(&self) -> bool {
        self.port().in_isr()
    }

    // ============ Statistics ============

    /// Number of handlers currently on the stack
    pub fn nesting_level(&self) -> u32 {
        self.cs.with(|cs| self.table.get(cs).stats.current_nesting_level)
    }

    /// Consistent snapshot of the aggregate counters
    pub fn stats(&self) -> OsResult<IrqStats> {
        self.ensure_ready()?;
        Ok(self.cs.with(|cs| self.table.get(cs).stats))
    }

    /// Clear aggregate and per-descriptor counters
    pub fn reset_stats(&self) -> OsResult<()> {
        self.ensure_ready()?;

        self.cs.with(|cs| {
            let table = self.table.get(cs);
            table.stats.reset();
            for desc in table.external.iter_mut().chain(table.system.iter_mut()) {
                desc.call_count = 0;
                desc.total_execution_time_us = 0;
            }
        });
        Ok(())
    }

    /// Snapshot of one descriptor
    pub fn irq_info(&self, irq: IrqNum) -> OsResult<IrqInfo> {
        self.ensure_ready()?;
        let kind = irq.kind().ok_or(OsError::InvalidParam)?;

        Ok(self.cs.with(|cs| self.table.get(cs).slot(kind).info()))
    }

    /// Limits of the interrupt controller; valid before init
    pub fn capabilities(&self) -> IrqCapabilities {
        IrqCapabilities::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SimPort;

    fn nop(_: IrqNum, _: Context) {}

    #[test]
    fn test_use_before_init() {
        let port = SimPort::new(16_000_000);
        let ctrl = InterruptController::new(&port);
        let handler: fn(IrqNum, Context) = nop;

        assert_eq!(
            ctrl.register(IrqNum(3), Some(&handler), Context::NONE, 4),
            Err(OsError::NotInitialized)
        );
        assert_eq!(ctrl.enable(IrqNum(3)), Err(OsError::NotInitialized));
        assert_eq!(ctrl.stats(), Err(OsError::NotInitialized));
        assert_eq!(ctrl.deinit(), Err(OsError::NotInitialized));
    }

    #[test]
    fn test_double_init() {
        let port = SimPort::new(16_000_000);
        let ctrl = InterruptController::new(&port);

        assert_eq!(ctrl.init(), Ok(()));
        assert_eq!(ctrl.init(), Err(OsError::AlreadyInitialized));
        assert_eq!(port.controller_inits(), 1);
    }

    #[test]
    fn test_init_assigns_system_priorities() {
        let port = SimPort::new(16_000_000);
        let ctrl = InterruptController::new(&port);
        ctrl.init().unwrap();

        assert_eq!(port.system_priority(SystemIrq::SysTick), 15);
        assert_eq!(port.system_priority(SystemIrq::PendSv), 15);
        assert_eq!(port.system_priority(SystemIrq::SvCall), 0);
        assert_eq!(port.priority(0), 15);
    }

    #[test]
    fn test_deinit_masks_lines() {
        let port = SimPort::new(16_000_000);
        let ctrl = InterruptController::new(&port);
        let handler: fn(IrqNum, Context) = nop;
        ctrl.init().unwrap();

        ctrl.register(IrqNum(12), Some(&handler), Context::NONE, 2).unwrap();
        ctrl.enable(IrqNum(12)).unwrap();
        assert!(port.is_enabled(12));

        ctrl.deinit().unwrap();
        assert!(!port.is_enabled(12));
        assert!(!ctrl.is_initialized());

        ctrl.init().unwrap();
        assert_eq!(ctrl.get_priority(IrqNum(12)), Err(OsError::NotRegistered));
    }

    #[test]
    fn test_system_slot_contract() {
        let port = SimPort::new(16_000_000);
        let ctrl = InterruptController::new(&port);
        let handler: fn(IrqNum, Context) = nop;
        ctrl.init().unwrap();

        assert_eq!(ctrl.enable(IrqNum::PENDSV), Err(OsError::NotRegistered));
        ctrl.register(IrqNum::PENDSV, Some(&handler), Context::NONE, 14).unwrap();
        assert_eq!(port.system_priority(SystemIrq::PendSv), 14);
        assert_eq!(
            ctrl.register(IrqNum::PENDSV, Some(&handler), Context::NONE, 14),
            Err(OsError::AlreadyRegistered)
        );
        assert_eq!(ctrl.enable(IrqNum::PENDSV), Ok(()));
        assert_eq!(ctrl.disable(IrqNum::PENDSV), Err(OsError::NotSupported));
        assert_eq!(ctrl.trigger(IrqNum::PENDSV), Err(OsError::NotSupported));

        ctrl.unregister(IrqNum::PENDSV).unwrap();
        assert_eq!(port.system_priority(SystemIrq::PendSv), 15);
    }

    #[test]
    fn test_reserved_identifiers_rejected() {
        let port = SimPort::new(16_000_000);
        let ctrl = InterruptController::new(&port);
        let handler: fn(IrqNum, Context) = nop;
        ctrl.init().unwrap();

        assert_eq!(
            ctrl.register(IrqNum(-3), Some(&handler), Context::NONE, 1),
            Err(OsError::InvalidParam)
        );
        assert_eq!(ctrl.disable(IrqNum(-4)), Err(OsError::InvalidParam));
        assert_eq!(
            ctrl.register(IrqNum(CFG_MAX_EXTERNAL_IRQS as i16), Some(&handler), Context::NONE, 1),
            Err(OsError::InvalidParam)
        );
    }
}
