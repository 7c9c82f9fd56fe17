//! Calibration of the APIC timer against the PIT.

use bare_metal::cpu::io::PortIo;

use super::{ApicError, ApicIo, LocalApic, Register, TimerDivisor};
use crate::pit;

/// The calibration interval is `1 / CALIBRATION_FRACTION` seconds.
pub const CALIBRATION_FRACTION: u32 = 20;

impl<IO: ApicIo> LocalApic<IO> {
    /// Let the timer count down from its maximum during one PIT calibration interval and return
    /// the count that was left. The timer LVT is masked afterwards.
    pub unsafe fn measure_timer<P: PortIo>(&self, ports: &mut P, spin_limit: u64) -> Result<u32, ApicError> {
        pit::start_one_shot(ports, pit::reload_for(CALIBRATION_FRACTION));
        self.write(Register::TIMER_INITIAL_COUNT, 0xffff_ffff);

        let waited = pit::wait_expired(ports, spin_limit);
        self.mask_timer();
        let spins = waited.map_err(ApicError::CalibrationTimeout)?;

        let remaining = self.read(Register::TIMER_CURRENT_COUNT);
        debug!("[APIC] calibration took {} polls, {:#x} ticks left", spins, remaining);
        Ok(remaining)
    }
}

/// Initial count for a periodic timer firing `frequency_hz` times per second with the timer
/// dividing by 16, given the count left after one calibration interval.
pub fn calibration_factor(remaining: u32, frequency_hz: u32) -> Result<u32, ApicError> {
    let divisor = TimerDivisor::Divisor16.divisor() as u64;
    let elapsed = (0xffff_ffff - remaining) as u64;
    let ticks_per_second = elapsed * divisor * CALIBRATION_FRACTION as u64;
    let factor = ticks_per_second / frequency_hz as u64 / divisor;

    if factor >> 32 != 0 {
        return Err(ApicError::FactorTooLarge(factor));
    }
    Ok(factor as u32)
}
