//! Local APIC bring-up on every core.

use core::sync::atomic::{AtomicU32, Ordering};

use bare_metal::cpu::io::{CpuPorts, PortIo};
use bare_metal::cpu::{msr, Features};
use interrupts::apic::timer::calibration_factor;
use interrupts::apic::{ApicBase, ApicError, ApicIo, ApicMode, Hardware, LocalApic};
use interrupts::pic::Pic;
use kmem::paging::MapFlags;
use kmem::physical::PageFrame;

use crate::config::{
    CALIBRATION_SPIN_LIMIT, PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET, SPURIOUS_VECTOR, TIMER_FREQUENCY_HZ, TIMER_VECTOR,
};
use crate::memory;
use crate::smp::{CpuRecord, CpuRegistry};

/// The APIC variant is selected once by the BSP and then used by every core.
static LAPIC: spin::Once<LocalApic<Hardware>> = spin::Once::new();

/// Periodic timer count measured by the BSP.
static TIMER_INITIAL_COUNT: AtomicU32 = AtomicU32::new(0);

pub fn local_apic() -> &'static LocalApic<Hardware> {
    match LAPIC.get() {
        Some(apic) => apic,
        None => panic!("[APIC] used before it was set up"),
    }
}

/// Select and enable the APIC of the BSP, claim the BSP's registry record and start the timer.
pub unsafe fn init_bsp(registry: &'static CpuRegistry) -> &'static CpuRecord {
    let base = ApicBase(msr::IA32_APIC_BASE.read());
    let mode = match ApicMode::select(Features::current(), base) {
        Ok(mode) => mode,
        Err(err) => panic!("Unable to find a suitable APIC timer ({:?})", err),
    };
    let apic = LAPIC.call_once(|| LocalApic::new(mode, Hardware));

    if let ApicMode::XApic { base: window } = mode {
        memory::map(window, PageFrame::including(base.address()),
                    MapFlags::WRITABLE | MapFlags::DEVICE | MapFlags::KERNEL);
    }
    apic.enable(base);

    let id = apic.id();
    let record = match registry.claim_bsp(id) {
        Ok(record) => record,
        Err(err) => panic!("APIC ID outside the supported range ({:?})", err),
    };
    info!("[APIC] BSP has APIC ID {} ({})", id, if mode.is_x2apic() { "x2APIC" } else { "xAPIC" });

    apic.initialize(SPURIOUS_VECTOR, TIMER_VECTOR);
    let count = match calibrate(apic, &mut CpuPorts, CALIBRATION_SPIN_LIMIT, TIMER_FREQUENCY_HZ) {
        Ok(count) => count,
        Err(ApicError::FactorTooLarge(factor)) => {
            panic!("The APIC frequency factor {:#x} is too large for the architecture", factor)
        }
        Err(err) => panic!("APIC timer calibration failed ({:?})", err),
    };
    TIMER_INITIAL_COUNT.store(count, Ordering::Release);
    apic.arm_timer(count, TIMER_VECTOR);
    record
}

/// Enable the APIC of an AP and find its registry record.
pub unsafe fn init_ap(registry: &'static CpuRegistry) -> &'static CpuRecord {
    let apic = local_apic();
    apic.enable(apic.read_base());

    let id = apic.id();
    let record = match registry.by_apic_id(id) {
        Ok(record) => record,
        Err(err) => panic!("APIC ID outside the supported range ({:?})", err),
    };

    apic.initialize(SPURIOUS_VECTOR, TIMER_VECTOR);
    apic.arm_timer(TIMER_INITIAL_COUNT.load(Ordering::Acquire), TIMER_VECTOR);
    record
}

/// Measure the timer against the PIT, then move the 8259s out of the way and mask them.
/// Returns the initial count for a periodic timer firing `frequency_hz` times per second.
pub unsafe fn calibrate<IO: ApicIo, P: PortIo>(
    apic: &LocalApic<IO>, ports: &mut P, spin_limit: u64, frequency_hz: u32,
) -> Result<u32, ApicError> {
    let remaining = apic.measure_timer(ports, spin_limit)?;
    Pic::new(&mut *ports).disable(PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET);
    let count = calibration_factor(remaining, frequency_hz)?;
    debug!("[APIC] timer count {} for {} Hz", count, frequency_hz);
    Ok(count)
}

#[cfg(test)]
mod test {
    use super::*;
    use bare_metal::cpu::msr::Msr;
    use bare_metal::cpu::io::PortNumber;
    use bare_metal::VirtAddr;
    use std::cell::RefCell;
    use std::vec::Vec;

    const BASE: usize = 0xfee0_0000;
    const CURRENT_COUNT: usize = BASE + 0x390;

    struct FakeApic {
        current_count: u32,
        writes: RefCell<Vec<(usize, u32)>>,
    }

    impl ApicIo for FakeApic {
        unsafe fn mmio_read(&self, addr: VirtAddr) -> u32 {
            if addr.0 == CURRENT_COUNT { self.current_count } else { 0 }
        }

        unsafe fn mmio_write(&self, addr: VirtAddr, value: u32) {
            self.writes.borrow_mut().push((addr.0, value));
        }

        unsafe fn msr_read(&self, _msr: Msr) -> u64 {
            0
        }

        unsafe fn msr_write(&self, _msr: Msr, _value: u64) {}
    }

    /// The PIT output reads as expired right away.
    #[derive(Default)]
    struct Ports {
        writes: Vec<(u16, u8)>,
        expired: bool,
    }

    impl PortIo for Ports {
        unsafe fn read_u8(&mut self, port: PortNumber) -> u8 {
            if port.0 == 0x61 && self.expired { 0x20 } else { 0 }
        }

        unsafe fn write_u8(&mut self, port: PortNumber, data: u8) {
            self.writes.push((port.0, data));
        }
    }

    fn apic(elapsed: u32) -> LocalApic<FakeApic> {
        let fake = FakeApic { current_count: 0xffff_ffff - elapsed, writes: RefCell::new(Vec::new()) };
        LocalApic::new(ApicMode::XApic { base: VirtAddr(BASE) }, fake)
    }

    #[test]
    fn one_khz_from_a_twentieth_second() {
        let apic = apic(50_000);
        let mut ports = Ports { expired: true, ..Ports::default() };
        let count = unsafe { calibrate(&apic, &mut ports, 10, 1000) };
        // 50000 ticks in 1/20 s at divisor 16, so 62.5 MHz input and 1000 per millisecond
        assert_eq!(count, Ok(1000));

        // the 8259s end up remapped and fully masked
        assert!(ports.writes.contains(&(0x21, PIC_MASTER_OFFSET)));
        assert!(ports.writes.contains(&(0xa1, PIC_SLAVE_OFFSET)));
        assert_eq!(&ports.writes[ports.writes.len() - 2..], &[(0x21, 0xff), (0xa1, 0xff)]);
    }

    #[test]
    fn factor_wider_than_32_bits() {
        let apic = apic(0xffff_ffff);
        let mut ports = Ports { expired: true, ..Ports::default() };
        let result = unsafe { calibrate(&apic, &mut ports, 10, 1) };
        assert_eq!(result, Err(ApicError::FactorTooLarge(0xffff_ffff * 20)));
    }

    #[test]
    fn pit_never_expires() {
        let apic = apic(50_000);
        let mut ports = Ports::default();
        let result = unsafe { calibrate(&apic, &mut ports, 10, 1000) };
        assert!(matches!(result, Err(ApicError::CalibrationTimeout(_))));
        // the legacy controllers are left alone
        assert!(!ports.writes.iter().any(|w| w.0 == 0x21 || w.0 == 0xa1));
    }
}
