//! SysTick Blink - software timers driven through the interrupt dispatcher
//!
//! Green LED (PD12) on the STM32F407 Discovery toggles from a periodic
//! timer; a one-shot timer ends the run through semihosting.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cortex_m_rt::{entry, exception};
use cortex_m_semihosting::{debug, hprintln};
use dsrtos::pac;
use dsrtos::port::CortexM4;
use dsrtos::{Context, InterruptController, IrqNum, TimerId, TimerScheduler};

// Reset clock (HSI)
static PORT: CortexM4 = CortexM4::new(16_000_000);
static IRQ: InterruptController<'static, CortexM4> = InterruptController::new(&PORT);
static TIMERS: TimerScheduler<'static, CortexM4> = TimerScheduler::new(&IRQ);

static LED_ON: AtomicBool = AtomicBool::new(false);
static TOGGLES: AtomicU32 = AtomicU32::new(0);

// ============ LED Control ============

fn led_init() {
    pac::RCC.ahb1enr().modify(|w| w.set_gpioden(true));
    pac::GPIOD.moder().modify(|w| w.set_moder(12, pac::gpio::vals::Moder::OUTPUT));
    pac::GPIOD.otyper().modify(|w| w.set_ot(12, pac::gpio::vals::Ot::PUSHPULL));
}

fn led_set(on: bool) {
    if on {
        pac::GPIOD.bsrr().write(|w| w.set_bs(12, true));
    } else {
        pac::GPIOD.bsrr().write(|w| w.set_br(12, true));
    }
}

// ============ Timer callbacks ============

fn blink(_: TimerId, _: Context) {
    let on = !LED_ON.fetch_xor(true, Ordering::Relaxed);
    led_set(on);
    TOGGLES.fetch_add(1, Ordering::Relaxed);
}

fn finish(_: TimerId, _: Context) {
    hprintln!("toggled {} times", TOGGLES.load(Ordering::Relaxed));
    debug::exit(debug::EXIT_SUCCESS);
}

static BLINK: fn(TimerId, Context) = blink;
static FINISH: fn(TimerId, Context) = finish;

// ============ Vectors ============

#[exception]
fn SysTick() {
    IRQ.dispatch(IrqNum::SYSTICK);
}

#[exception]
unsafe fn DefaultHandler(irqn: i16) {
    IRQ.dispatch(IrqNum(irqn));
}

// ============ Main ============

#[entry]
fn main() -> ! {
    led_init();

    if let Err(err) = IRQ.init() {
        hprintln!("interrupt init failed: {:#06x}", err.code());
        debug::exit(debug::EXIT_FAILURE);
    }
    if let Err(err) = TIMERS.init() {
        hprintln!("timer init failed: {:#06x}", err.code());
        debug::exit(debug::EXIT_FAILURE);
    }

    if let Err(err) = TIMERS.register_periodic(&BLINK, Context::NONE, 250_000) {
        hprintln!("blink timer failed: {:#06x}", err.code());
        debug::exit(debug::EXIT_FAILURE);
    }
    if let Err(err) = TIMERS.register_oneshot(&FINISH, Context::NONE, 5_000_000) {
        hprintln!("finish timer failed: {:#06x}", err.code());
        debug::exit(debug::EXIT_FAILURE);
    }
    dsrtos::info!("blink running");

    loop {
        cortex_m::asm::wfi();
    }
}
