//! Language items and default exception handlers

// When defmt feature is enabled on the target, use defmt_rtt and panic_probe
#[cfg(all(feature = "defmt", target_os = "none"))]
use defmt_rtt as _;

#[cfg(all(feature = "defmt", target_os = "none"))]
use panic_probe as _;

// Defmt panic handler
#[cfg(all(feature = "defmt", target_os = "none"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

// Halt on panic when defmt is disabled
#[cfg(all(not(feature = "defmt"), target_os = "none"))]
use panic_halt as _;

// Default HardFault handler
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[cortex_m_rt::exception]
unsafe fn HardFault(_ef: &cortex_m_rt::ExceptionFrame) -> ! {
    loop {
        cortex_m::asm::udf();
    }
}

// Log timestamps in core cycles; the counter is enabled by the interrupt controller init
#[cfg(all(feature = "defmt", target_os = "none"))]
defmt::timestamp!("{=u32}", cortex_m::peripheral::DWT::cycle_count());
