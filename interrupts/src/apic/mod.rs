//! Driver for the local APIC in either xAPIC (memory mapped) or x2APIC (MSR) mode.
//!
//! The mode is chosen once from the CPUID feature flags and never changes afterwards. All
//! register traffic goes through an `ApicIo` so the driver logic can be exercised without
//! hardware.

pub mod base;
pub mod icr;
pub mod lvt;
pub mod registers;
pub mod timer;

use bare_metal::cpu::msr::{self, Msr};
use bare_metal::cpu::Features;
use bare_metal::wait::Timeout;
use bare_metal::{PhysAddr, VirtAddr};

pub use self::base::ApicBase;
pub use self::icr::{DeliveryMode, Icr};
pub use self::lvt::{LvtEntry, TimerDivisor, TimerMode};
pub use self::registers::Register;

/// Software enable bit of the spurious interrupt vector register.
const SOFTWARE_ENABLE: u32 = 1 << 8;
/// Flat model in the destination format register.
const FLAT_MODEL: u32 = 0xffff_ffff;
/// Logical APIC ID bit set in the LDR during bring-up.
const LOGICAL_ID_BIT: u32 = 1 << 24;

/// Raw access to the APIC registers.
pub trait ApicIo {
    unsafe fn mmio_read(&self, addr: VirtAddr) -> u32;
    unsafe fn mmio_write(&self, addr: VirtAddr, value: u32);
    unsafe fn msr_read(&self, msr: Msr) -> u64;
    unsafe fn msr_write(&self, msr: Msr, value: u64);
}

/// The registers of the CPU executing the code.
#[derive(Debug, Default, Copy, Clone)]
pub struct Hardware;

impl ApicIo for Hardware {
    #[inline(always)]
    unsafe fn mmio_read(&self, addr: VirtAddr) -> u32 {
        addr.as_ptr::<u32>().read_volatile()
    }

    #[inline(always)]
    unsafe fn mmio_write(&self, addr: VirtAddr, value: u32) {
        addr.as_mut_ptr::<u32>().write_volatile(value)
    }

    #[inline(always)]
    unsafe fn msr_read(&self, msr: Msr) -> u64 {
        msr.read()
    }

    #[inline(always)]
    unsafe fn msr_write(&self, msr: Msr, value: u64) {
        msr.write(value)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApicMode {
    /// Registers are memory mapped at `base`.
    XApic { base: VirtAddr },
    /// Registers are MSRs starting at 0x800.
    X2Apic,
}

impl ApicMode {
    /// Pick the mode from the CPUID feature flags. The xAPIC window is expected to be identity mapped.
    pub fn select(features: Features, base: ApicBase) -> Result<ApicMode, ApicError> {
        if !features.apic {
            Err(ApicError::Unsupported)
        } else if features.x2apic {
            Ok(ApicMode::X2Apic)
        } else {
            Ok(ApicMode::XApic { base: VirtAddr::identity(base.address()) })
        }
    }

    pub fn is_x2apic(&self) -> bool {
        *self == ApicMode::X2Apic
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApicError {
    /// CPUID does not report a local APIC.
    Unsupported,
    /// The local APIC ID does not fit into the CPU table.
    IdOutOfRange { id: u32, capacity: usize },
    /// The timer ticks too fast for the requested frequency.
    FactorTooLarge(u64),
    /// The PIT never signalled the end of the calibration interval.
    CalibrationTimeout(Timeout),
}

/// The local APIC of the executing core.
#[derive(Debug, Copy, Clone)]
pub struct LocalApic<IO> {
    mode: ApicMode,
    io: IO,
}

impl<IO: ApicIo> LocalApic<IO> {
    pub const fn new(mode: ApicMode, io: IO) -> Self {
        LocalApic { mode, io }
    }

    pub fn mode(&self) -> ApicMode {
        self.mode
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    /// Read a register. Registers that are not readable in the current mode read as 0.
    pub unsafe fn read(&self, reg: Register) -> u32 {
        if !reg.is_readable(self.mode.is_x2apic()) {
            return 0;
        }
        match self.mode {
            ApicMode::XApic { base } => self.io.mmio_read(base + reg.0 as usize),
            ApicMode::X2Apic => self.io.msr_read(reg.msr()) as u32,
        }
    }

    /// Write a register. Writes to registers that are not writable in the current mode are dropped.
    pub unsafe fn write(&self, reg: Register, value: u32) {
        if !reg.is_writable(self.mode.is_x2apic()) {
            trace!("[APIC] dropped write of {:#x} to {:#x}", value, reg.0);
            return;
        }
        match self.mode {
            ApicMode::XApic { base } => self.io.mmio_write(base + reg.0 as usize, value),
            ApicMode::X2Apic => self.io.msr_write(reg.msr(), value as u64),
        }
    }

    /// Issue an IPI. The xAPIC takes the high half first since writing the low half sends it.
    pub unsafe fn write_icr(&self, icr: Icr) {
        match self.mode {
            ApicMode::XApic { .. } => {
                let value = icr.xapic_value();
                self.write(Register::ICR_HIGH, (value >> 32) as u32);
                self.write(Register::ICR_LOW, value as u32);
            }
            ApicMode::X2Apic => self.io.msr_write(Register::ICR_LOW.msr(), icr.x2apic_value()),
        }
    }

    /// Test bit `index` of one of the 256 bit status vectors (ISR, TMR or IRR).
    pub unsafe fn check_indexed_status(&self, reg: Register, index: u8) -> bool {
        if !reg.is_status() {
            return false;
        }
        let word = (index / 32) as u32;
        let bit = 1u32 << (index % 32);
        let value = match self.mode {
            ApicMode::XApic { base } => self.io.mmio_read(base + (reg.0 + word * 0x10) as usize),
            ApicMode::X2Apic => self.io.msr_read(Msr(reg.msr().0 + word)) as u32,
        };
        value & bit != 0
    }

    /// The hardware ID of the executing core.
    pub unsafe fn id(&self) -> u32 {
        match self.mode {
            ApicMode::XApic { .. } => self.read(Register::ID) >> 24,
            ApicMode::X2Apic => self.read(Register::ID),
        }
    }

    /// Signal the end of the current interrupt handler.
    pub unsafe fn eoi(&self) {
        self.write(Register::EOI, 0);
    }

    pub unsafe fn send_init(&self, core: u32) {
        self.write_icr(Icr::init(core));
    }

    pub unsafe fn send_startup(&self, core: u32, start: PhysAddr) {
        self.write_icr(Icr::startup(core, start.0));
    }

    pub unsafe fn read_base(&self) -> ApicBase {
        ApicBase(self.io.msr_read(msr::IA32_APIC_BASE))
    }

    /// Globally enable the APIC, in x2APIC mode if that was selected.
    pub unsafe fn enable(&self, base: ApicBase) {
        let value = base.enabled(self.mode.is_x2apic());
        debug!("[APIC] enabling with base msr {:#x}", value.0);
        self.io.msr_write(msr::IA32_APIC_BASE, value.0);
    }

    /// Put the APIC into a defined state: software enabled, flat logical destinations, every LVT
    /// except thermal masked, priority 0, timer dividing by 16 and pointing at `timer_vector`.
    pub unsafe fn initialize(&self, spurious_vector: u8, timer_vector: u8) {
        self.write(Register::ERROR_STATUS, 0);
        self.write(Register::SPURIOUS_INTERRUPT_VECTOR, spurious_vector as u32 | SOFTWARE_ENABLE);

        self.write(Register::DESTINATION_FORMAT, FLAT_MODEL);
        if !self.mode.is_x2apic() {
            let ldr = self.read(Register::LOGICAL_DESTINATION);
            self.write(Register::LOGICAL_DESTINATION, ldr | LOGICAL_ID_BIT);
        }

        let masked = LvtEntry::disabled().0;
        self.write(Register::LVT_TIMER, masked);
        self.write(Register::LVT_PERF, masked);
        self.write(Register::LVT_LINT0, masked);
        self.write(Register::LVT_LINT1, masked);
        self.write(Register::LVT_ERROR, masked);
        self.write(Register::LVT_THERMAL, 0);
        self.write(Register::TASK_PRIORITY, 0);
        self.write(Register::TIMER_DIVIDE_CONFIG, TimerDivisor::Divisor16.register_value());
        self.write(Register::LVT_TIMER, LvtEntry::timer(timer_vector, TimerMode::OneShot).0);
    }

    pub unsafe fn mask_timer(&self) {
        self.write(Register::LVT_TIMER, LvtEntry::disabled().0);
    }

    /// Start the timer in periodic mode, firing `timer_vector` every `initial_count` ticks.
    pub unsafe fn arm_timer(&self, initial_count: u32, timer_vector: u8) {
        self.write(Register::TIMER_INITIAL_COUNT, initial_count);
        self.write(Register::LVT_TIMER, LvtEntry::timer(timer_vector, TimerMode::Periodic).0);
    }
}
