//! Batch registration and enable/disable
//!
//! Either every entry of a batch takes effect or none does.

use crate::config::CFG_MAX_EXTERNAL_IRQS;
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::{is_valid_prio, Context, IrqFlags, IrqKind, IrqNum, IrqPrio, SystemIrq};
use crate::{debug, warn};

use super::handler::IrqDescriptor;
use super::{IrqHandler, InterruptController};

/// Largest batch: every external line plus the system slots
const MAX_BATCH: usize = CFG_MAX_EXTERNAL_IRQS + SystemIrq::COUNT;

/// One entry of [`InterruptController::register_batch`]
#[derive(Clone, Copy)]
pub struct IrqConfig<'a> {
    pub irq: IrqNum,
    pub handler: Option<&'a dyn IrqHandler>,
    pub context: Context,
    pub priority: IrqPrio,
    /// Enable delivery right after registering
    pub auto_enable: bool,
}

impl<'a> IrqConfig<'a> {
    pub const fn new(irq: IrqNum, handler: &'a dyn IrqHandler, priority: IrqPrio) -> Self {
        Self {
            irq,
            handler: Some(handler),
            context: Context::NONE,
            priority,
            auto_enable: false,
        }
    }

    pub const fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub const fn enabled(mut self) -> Self {
        self.auto_enable = true;
        self
    }
}

fn check_len(len: usize) -> OsResult<()> {
    if len == 0 || len > MAX_BATCH {
        Err(OsError::InvalidParam)
    } else {
        Ok(())
    }
}

/// Slot state captured before a batch entry touches it
#[derive(Clone, Copy)]
struct Saved<'a> {
    desc: IrqDescriptor<'a>,
    pending: bool,
}

impl<'a> Saved<'a> {
    const NONE: Self = Self {
        desc: IrqDescriptor::EMPTY,
        pending: false,
    };
}

impl<'a, P: Port> InterruptController<'a, P> {
    /// Register (and optionally enable) several interrupts at once
    ///
    /// Entries are applied in order under one critical section. On the first
    /// failure every slot touched so far is put back exactly as it was, in
    /// reverse order, and that failure is returned.
    ///
    /// # Returns
    /// * `Err(OsError::InvalidParam)` - Empty batch or more entries than slots
    /// * Any error [`register`](Self::register) or [`enable`](Self::enable) reports
    pub fn register_batch(&self, configs: &[IrqConfig<'a>]) -> OsResult<()> {
        self.ensure_ready()?;
        check_len(configs.len())?;

        self.cs.with(|cs| {
            let table = self.table.get(cs);
            let mut saved = [Saved::NONE; MAX_BATCH];

            for (done, cfg) in configs.iter().enumerate() {
                match self.apply_config(table, cfg) {
                    Ok(prev) => saved[done] = prev,
                    Err(err) => {
                        for (prev, snap) in configs[..done].iter().zip(&saved[..done]).rev() {
                            if let Some(kind) = prev.irq.kind() {
                                self.restore_locked(table, kind, snap);
                            }
                        }
                        warn!("irq: batch aborted at entry {=usize}", done);
                        return Err(err);
                    }
                }
            }
            Ok(())
        })?;

        debug!("irq: batch of {=usize} registered", configs.len());
        Ok(())
    }

    /// Apply one entry and return the slot state it replaced
    fn apply_config(
        &self,
        table: &mut super::IrqTable<'a>,
        cfg: &IrqConfig<'a>,
    ) -> OsResult<Saved<'a>> {
        let handler = cfg.handler.ok_or(OsError::NullHandler)?;
        let kind = cfg.irq.kind().ok_or(OsError::InvalidParam)?;
        if !is_valid_prio(cfg.priority) {
            return Err(OsError::InvalidParam);
        }

        let prev = Saved {
            desc: *table.slot(kind),
            pending: match kind {
                IrqKind::External(n) => self.port().is_irq_pending(n),
                IrqKind::System(_) => false,
            },
        };

        self.register_locked(table, kind, handler, cfg.context, cfg.priority)?;
        if cfg.auto_enable {
            if let Err(err) = self.enable_locked(table, kind) {
                self.restore_locked(table, kind, &prev);
                return Err(err);
            }
        }
        Ok(prev)
    }

    /// Put a slot and its hardware line back to a captured state
    fn restore_locked(&self, table: &mut super::IrqTable<'a>, kind: IrqKind, saved: &Saved<'a>) {
        let desc = table.slot(kind);
        *desc = IrqDescriptor {
            epoch: desc.epoch.wrapping_add(1),
            ..saved.desc
        };
        self.apply_priority(kind, saved.desc.priority);

        if let IrqKind::External(n) = kind {
            let port = self.port();
            if saved.desc.flags.contains(IrqFlags::ENABLED) {
                port.enable_irq(n);
            } else {
                port.disable_irq(n);
            }
            if saved.pending {
                port.pend_irq(n);
            }
        }
    }

    /// Enable several registered interrupts
    ///
    /// Nothing is touched unless every entry is registered.
    pub fn enable_batch(&self, irqs: &[IrqNum]) -> OsResult<()> {
        self.ensure_ready()?;
        check_len(irqs.len())?;

        self.cs.with(|cs| {
            let table = self.table.get(cs);

            for irq in irqs {
                let kind = irq.kind().ok_or(OsError::InvalidParam)?;
                if !table.slot(kind).is_registered() {
                    return Err(OsError::NotRegistered);
                }
            }
            for irq in irqs {
                if let Some(kind) = irq.kind() {
                    self.enable_locked(table, kind)?;
                }
            }
            Ok(())
        })
    }

    /// Disable several external interrupts
    ///
    /// Nothing is touched if any entry is a system exception or out of range.
    pub fn disable_batch(&self, irqs: &[IrqNum]) -> OsResult<()> {
        self.ensure_ready()?;
        check_len(irqs.len())?;

        self.cs.with(|cs| {
            let table = self.table.get(cs);

            for irq in irqs {
                match irq.kind() {
                    Some(IrqKind::External(_)) => {}
                    Some(IrqKind::System(_)) => return Err(OsError::NotSupported),
                    None => return Err(OsError::InvalidParam),
                }
            }
            for irq in irqs {
                if let Some(kind) = irq.kind() {
                    self.disable_locked(table, kind)?;
                }
            }
            Ok(())
        })
    }
}
