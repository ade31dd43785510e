//! Software timer scheduler tests
//!
//! Ticks are delivered through the interrupt dispatcher exactly as the
//! SysTick vector would deliver them.

#[cfg(test)]
mod scheduling_tests {
    use dsrtos::port::SimPort;
    use dsrtos::{Context, InterruptController, IrqNum, TimerId, TimerScheduler};
    use portable_atomic::{AtomicU32, Ordering};

    fn nop(_: TimerId, _: Context) {}

    fn tick<P: dsrtos::port::Port>(irq: &InterruptController<'_, P>, n: u32) {
        for _ in 0..n {
            irq.dispatch(IrqNum::SYSTICK);
        }
    }

    #[test]
    fn test_periodic_5ms_on_1ms_tick() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        irq.init().unwrap();
        timers.init().unwrap();

        let id = timers.register_periodic(&cb, Context::NONE, 5_000).unwrap();

        tick(&irq, 4);
        assert_eq!(timers.get_call_count(id), Ok(0));
        assert_eq!(timers.get_remaining(id), Ok(1_000));

        tick(&irq, 1);
        assert_eq!(timers.get_call_count(id), Ok(1));
        assert_eq!(timers.get_remaining(id), Ok(5_000));

        tick(&irq, 20);
        assert_eq!(timers.get_call_count(id), Ok(5));
        assert_eq!(timers.is_active(id), Ok(true));

        assert_eq!(timers.ticks(), 25);
        assert_eq!(irq.irq_info(IrqNum::SYSTICK).unwrap().call_count, 25);
    }

    #[test]
    fn test_oneshot_fires_once() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let hits = AtomicU32::new(0);
        let cb = |_: TimerId, ctx: Context| {
            if let Some(hits) = unsafe { ctx.cast::<AtomicU32>() } {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        irq.init().unwrap();
        timers.init().unwrap();

        let id = timers.register_oneshot(&cb, Context::new(&hits), 2_000).unwrap();

        tick(&irq, 10);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(timers.is_active(id), Ok(false));
        assert_eq!(timers.get_call_count(id), Err(dsrtos::OsError::NotRegistered));
    }

    #[test]
    fn test_timers_fire_in_slot_order() {
        static ORDER: AtomicU32 = AtomicU32::new(0);

        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        // Record firing order as a base-16 digit string
        let cb = |id: TimerId, _: Context| {
            let prev = ORDER.load(Ordering::SeqCst);
            ORDER.store(prev * 16 + id as u32 + 1, Ordering::SeqCst);
        };
        irq.init().unwrap();
        timers.init().unwrap();

        timers.register_at(5, Some(&cb), Context::NONE, 1_000, false).unwrap();
        timers.register_at(2, Some(&cb), Context::NONE, 1_000, false).unwrap();
        timers.register_at(9, Some(&cb), Context::NONE, 1_000, false).unwrap();

        tick(&irq, 1);
        assert_eq!(ORDER.load(Ordering::SeqCst), 0x36A);
    }

    #[test]
    fn test_modify_period_restarts_countdown() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        irq.init().unwrap();
        timers.init().unwrap();

        let id = timers.register_periodic(&cb, Context::NONE, 10_000).unwrap();
        tick(&irq, 3);
        assert_eq!(timers.get_remaining(id), Ok(7_000));

        timers.modify_period(id, 2_000).unwrap();
        assert_eq!(timers.get_remaining(id), Ok(2_000));

        tick(&irq, 2);
        assert_eq!(timers.get_call_count(id), Ok(1));
        assert_eq!(timers.timer_info(id).unwrap().period_us, 2_000);
    }

    #[test]
    fn test_callback_unregisters_itself() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb = |id: TimerId, ctx: Context| {
            let timers = unsafe { ctx.cast::<TimerScheduler<'_, SimPort>>() }.unwrap();
            timers.unregister(id).unwrap();
        };
        irq.init().unwrap();
        timers.init().unwrap();

        let id = timers.register_periodic(&cb, Context::new(&timers), 1_000).unwrap();
        tick(&irq, 3);

        assert_eq!(timers.is_active(id), Ok(false));
        let stats = timers.stats().unwrap();
        assert_eq!(stats.callback_executions, 1);
        assert_eq!(stats.active_timers, 0);
    }

    #[test]
    fn test_callback_modification_wins_over_reload() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb = |id: TimerId, ctx: Context| {
            let timers = unsafe { ctx.cast::<TimerScheduler<'_, SimPort>>() }.unwrap();
            if timers.timer_info(id).unwrap().period_us == 1_000 {
                timers.modify_period(id, 3_000).unwrap();
            }
        };
        irq.init().unwrap();
        timers.init().unwrap();

        let id = timers.register_periodic(&cb, Context::new(&timers), 1_000).unwrap();
        tick(&irq, 1);
        assert_eq!(timers.get_remaining(id), Ok(3_000));
        assert_eq!(timers.get_call_count(id), Ok(1));

        tick(&irq, 3);
        assert_eq!(timers.get_call_count(id), Ok(2));
        assert_eq!(timers.get_remaining(id), Ok(3_000));
    }

    #[test]
    fn test_oneshot_rearmed_from_callback() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb = |id: TimerId, ctx: Context| {
            let timers = unsafe { ctx.cast::<TimerScheduler<'_, SimPort>>() }.unwrap();
            timers.modify_period(id, 2_000).unwrap();
        };
        irq.init().unwrap();
        timers.init().unwrap();

        let id = timers.register_oneshot(&cb, Context::new(&timers), 1_000).unwrap();
        tick(&irq, 1);
        assert_eq!(timers.is_active(id), Ok(true));
        assert_eq!(timers.get_remaining(id), Ok(2_000));
    }

    #[test]
    fn test_callback_time_is_measured() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb = |_: TimerId, ctx: Context| {
            let port = unsafe { ctx.cast::<SimPort>() }.unwrap();
            port.advance_us(30);
        };
        irq.init().unwrap();
        timers.init().unwrap();

        timers.register_periodic(&cb, Context::new(&port), 1_000).unwrap();
        tick(&irq, 2);

        let stats = timers.stats().unwrap();
        assert_eq!(stats.callback_executions, 2);
        assert_eq!(stats.max_callback_time_us, 30);
        assert_eq!(stats.systick_interrupts, 2);
    }
}

#[cfg(test)]
mod registration_tests {
    use dsrtos::port::SimPort;
    use dsrtos::{
        Context, InterruptController, IrqFlags, IrqNum, OsError, TimerCallback, TimerConfig,
        TimerId, TimerScheduler,
    };

    fn nop(_: TimerId, _: Context) {}

    #[test]
    fn test_use_before_init() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;

        assert_eq!(
            timers.register_periodic(&cb, Context::NONE, 1_000),
            Err(OsError::NotInitialized)
        );
        assert_eq!(timers.unregister(0), Err(OsError::NotInitialized));
        assert_eq!(timers.get_remaining(0), Err(OsError::NotInitialized));
        assert_eq!(timers.delay_us(10), Err(OsError::NotInitialized));
        assert_eq!(timers.delay_ms(5_000_000), Err(OsError::NotInitialized));
    }

    #[test]
    fn test_init_wires_systick() {
        let port = SimPort::new(168_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        irq.init().unwrap();
        timers.init().unwrap();

        assert_eq!(port.systick_reload(), Some(167_999));
        assert_eq!(irq.get_priority(IrqNum::SYSTICK), Ok(15));
        assert!(irq.irq_info(IrqNum::SYSTICK).unwrap().flags.contains(IrqFlags::ENABLED));
        assert_eq!(timers.init(), Err(OsError::AlreadyInitialized));

        let stats = timers.stats().unwrap();
        assert_eq!(stats.cpu_frequency_hz, 168_000_000);
        assert_eq!(stats.systick_frequency_hz, 1_000);
    }

    #[test]
    fn test_init_fails_if_systick_taken() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let handler = |_: IrqNum, _: Context| {};
        irq.init().unwrap();

        irq.register(IrqNum::SYSTICK, Some(&handler), Context::NONE, 15).unwrap();
        assert_eq!(timers.init(), Err(OsError::AlreadyRegistered));
        assert!(!timers.is_initialized());
        assert_eq!(port.systick_reload(), None);
    }

    #[test]
    fn test_register_checks() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        irq.init().unwrap();
        timers.init().unwrap();

        assert_eq!(timers.register(None, Context::NONE, 1_000, true), Err(OsError::NullHandler));
        assert_eq!(
            timers.register_periodic(&cb, Context::NONE, 99),
            Err(OsError::InvalidParam)
        );
        assert_eq!(timers.register_oneshot(&cb, Context::NONE, 100), Ok(0));

        assert_eq!(
            timers.register_at(0, Some(&cb), Context::NONE, 1_000, true),
            Err(OsError::AlreadyRegistered)
        );
        assert_eq!(
            timers.register_at(16, Some(&cb), Context::NONE, 1_000, true),
            Err(OsError::InvalidParam)
        );
    }

    #[test]
    fn test_slot_queries() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        irq.init().unwrap();
        timers.init().unwrap();

        assert_eq!(timers.is_active(3), Ok(false));
        assert_eq!(timers.is_active(16), Err(OsError::InvalidParam));
        assert_eq!(timers.get_remaining(3), Err(OsError::NotRegistered));
        assert_eq!(timers.get_remaining(16), Err(OsError::InvalidParam));
        assert_eq!(timers.unregister(3), Err(OsError::NotRegistered));
        assert_eq!(timers.modify_period(3, 1_000), Err(OsError::NotRegistered));

        timers.register_at(3, Some(&cb), Context::NONE, 4_000, true).unwrap();
        assert_eq!(timers.modify_period(3, 50), Err(OsError::InvalidParam));
        assert_eq!(timers.get_remaining(3), Ok(4_000));
        assert_eq!(timers.get_call_count(3), Ok(0));
    }

    #[test]
    fn test_batch_rolls_back() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        let c: &dyn TimerCallback = &cb;
        irq.init().unwrap();
        timers.init().unwrap();

        timers.register_at(4, Some(c), Context::NONE, 1_000, true).unwrap();

        let batch = [
            TimerConfig::periodic(1, c, 1_000),
            TimerConfig::oneshot(2, c, 5_000),
            TimerConfig::periodic(4, c, 1_000),
        ];
        assert_eq!(timers.register_batch(&batch), Err(OsError::AlreadyRegistered));
        assert_eq!(timers.is_active(1), Ok(false));
        assert_eq!(timers.is_active(2), Ok(false));
        assert_eq!(timers.is_active(4), Ok(true));
        assert_eq!(timers.stats().unwrap().active_timers, 1);

        let batch = [TimerConfig::periodic(1, c, 1_000), TimerConfig::oneshot(2, c, 10)];
        assert_eq!(timers.register_batch(&batch), Err(OsError::InvalidParam));
        assert_eq!(timers.is_active(1), Ok(false));

        let batch = [TimerConfig::periodic(1, c, 1_000), TimerConfig::oneshot(2, c, 5_000)];
        timers.register_batch(&batch).unwrap();
        assert_eq!(timers.stats().unwrap().active_timers, 3);

        assert_eq!(timers.register_batch(&[]), Err(OsError::InvalidParam));
    }

    #[test]
    fn test_reset_stats_keeps_ticks() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        let cb: fn(TimerId, Context) = nop;
        irq.init().unwrap();
        timers.init().unwrap();

        timers.register_periodic(&cb, Context::NONE, 1_000).unwrap();
        for _ in 0..3 {
            irq.dispatch(IrqNum::SYSTICK);
        }

        timers.reset_stats().unwrap();
        let stats = timers.stats().unwrap();
        assert_eq!(stats.system_tick_count, 3);
        assert_eq!(stats.systick_interrupts, 0);
        assert_eq!(stats.callback_executions, 0);
        assert_eq!(stats.active_timers, 1);
    }

    #[test]
    fn test_capabilities() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);

        let caps = timers.capabilities();
        assert_eq!(caps.max_timers, 16);
        assert_eq!(caps.min_period_us, 100);
        assert_eq!(caps.max_delay_us, 3_600_000_000);
        assert_eq!(caps.tick_rate_hz, 1_000);
    }
}

#[cfg(test)]
mod clock_tests {
    use dsrtos::port::{Port, SimPort};
    use dsrtos::time::{ms_to_ticks, ticks_to_ms};
    use dsrtos::{InterruptController, IrqNum, OsError, TimerScheduler};

    #[test]
    fn test_conversions() {
        assert_eq!(ticks_to_ms(1_500), 1_500);
        assert_eq!(ms_to_ticks(250), 250);
        assert_eq!(ticks_to_ms(0), 0);
    }

    #[test]
    fn test_conversions_at_range_limit() {
        assert_eq!(ticks_to_ms(u64::MAX), u64::MAX);
        assert_eq!(ms_to_ticks(u64::MAX), u64::MAX);
        assert_eq!(ticks_to_ms(u64::MAX / 1000), u64::MAX / 1000);
    }

    #[test]
    fn test_microseconds_interpolate() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        irq.init().unwrap();
        timers.init().unwrap();

        assert_eq!(timers.microseconds(), 0);
        port.advance_us(400);
        assert_eq!(timers.microseconds(), 400);

        // Wrapped but not serviced yet
        port.advance_us(700);
        assert_eq!(timers.microseconds(), 1_100);
        assert_eq!(timers.ticks(), 0);

        port.ack_systick();
        irq.dispatch(IrqNum::SYSTICK);
        assert_eq!(timers.ticks(), 1);
        assert_eq!(timers.milliseconds(), 1);
        assert_eq!(timers.microseconds(), 1_100);
    }

    #[test]
    fn test_delay_spins_long_enough() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        irq.init().unwrap();
        timers.init().unwrap();

        // One microsecond per counter read
        port.set_cycle_step(16);
        let start = port.cycle_count();
        timers.delay_us(500).unwrap();
        let end = port.cycle_count();

        assert!(end.wrapping_sub(start) >= 500 * 16);
        assert!(end.wrapping_sub(start) < 520 * 16);
    }

    #[test]
    fn test_delay_limits() {
        let port = SimPort::new(16_000_000);
        let irq = InterruptController::new(&port);
        let timers = TimerScheduler::new(&irq);
        irq.init().unwrap();
        timers.init().unwrap();

        let before = port.cycle_count();
        assert_eq!(timers.delay_us(0), Ok(()));
        assert_eq!(port.cycle_count(), before);

        assert_eq!(timers.delay_us(3_600_000_001), Err(OsError::InvalidParam));
        assert_eq!(timers.delay_ms(3_600_001), Err(OsError::InvalidParam));
        assert_eq!(timers.delay_ms(5_000_000), Err(OsError::InvalidParam));
    }
}
