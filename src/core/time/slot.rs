//! Timer slots and the callback capability

use crate::types::{Context, TimerFlags, TimerId};

/// Something that can run when a software timer expires
///
/// Callbacks run inside the tick interrupt. They may unregister or modify
/// their own slot, but must not block.
pub trait TimerCallback: Sync {
    fn invoke(&self, id: TimerId, context: Context);
}

impl<F> TimerCallback for F
where
    F: Fn(TimerId, Context) + Sync,
{
    #[inline(always)]
    fn invoke(&self, id: TimerId, context: Context) {
        self(id, context)
    }
}

#[derive(Clone, Copy)]
pub(crate) struct TimerDescriptor<'a> {
    pub(crate) callback: Option<&'a dyn TimerCallback>,
    pub(crate) context: Context,
    pub(crate) period_us: u32,
    pub(crate) remaining_us: u32,
    pub(crate) flags: TimerFlags,
    pub(crate) call_count: u32,
    /// Bumped whenever the slot is (re)registered or cleared
    pub(crate) epoch: u32,
}

impl<'a> TimerDescriptor<'a> {
    pub(crate) const EMPTY: Self = Self {
        callback: None,
        context: Context::NONE,
        period_us: 0,
        remaining_us: 0,
        flags: TimerFlags::empty(),
        call_count: 0,
        epoch: 0,
    };

    #[inline(always)]
    pub(crate) fn is_active(&self) -> bool {
        self.flags.contains(TimerFlags::ACTIVE)
    }

    #[inline(always)]
    pub(crate) fn is_periodic(&self) -> bool {
        self.flags.contains(TimerFlags::PERIODIC)
    }

    pub(crate) fn arm(
        &mut self,
        callback: &'a dyn TimerCallback,
        context: Context,
        period_us: u32,
        periodic: bool,
    ) {
        let kind = if periodic {
            TimerFlags::PERIODIC
        } else {
            TimerFlags::ONESHOT
        };
        *self = Self {
            callback: Some(callback),
            context,
            period_us,
            remaining_us: period_us,
            flags: TimerFlags::ACTIVE | kind,
            call_count: 0,
            epoch: self.epoch.wrapping_add(1),
        };
    }

    pub(crate) fn info(&self) -> TimerInfo {
        TimerInfo {
            period_us: self.period_us,
            remaining_us: self.remaining_us,
            flags: self.flags,
            call_count: self.call_count,
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self {
            epoch: self.epoch.wrapping_add(1),
            ..Self::EMPTY
        };
    }
}

/// One entry of [`TimerScheduler::register_batch`](super::TimerScheduler::register_batch)
#[derive(Clone, Copy)]
pub struct TimerConfig<'a> {
    pub id: TimerId,
    pub callback: Option<&'a dyn TimerCallback>,
    pub context: Context,
    pub period_us: u32,
    pub periodic: bool,
}

impl<'a> TimerConfig<'a> {
    pub const fn periodic(id: TimerId, callback: &'a dyn TimerCallback, period_us: u32) -> Self {
        Self {
            id,
            callback: Some(callback),
            context: Context::NONE,
            period_us,
            periodic: true,
        }
    }

    pub const fn oneshot(id: TimerId, callback: &'a dyn TimerCallback, delay_us: u32) -> Self {
        Self {
            id,
            callback: Some(callback),
            context: Context::NONE,
            period_us: delay_us,
            periodic: false,
        }
    }

    pub const fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// Read-only snapshot of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInfo {
    pub period_us: u32,
    pub remaining_us: u32,
    pub flags: TimerFlags,
    pub call_count: u32,
}
