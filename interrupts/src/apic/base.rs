use bare_metal::bits::Bits;
use bare_metal::PhysAddr;

/// Value of the `IA32_APIC_BASE` MSR.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ApicBase(pub u64);

impl ApicBase {
    const BSP: u32 = 8;
    const EXTD: u32 = 10;
    const ENABLE: u32 = 11;

    /// Whether this core is the bootstrap processor.
    pub fn is_bsp(&self) -> bool {
        self.0.get_bit(Self::BSP)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.get_bit(Self::ENABLE)
    }

    pub fn is_x2apic(&self) -> bool {
        self.0.get_bit(Self::EXTD)
    }

    /// Physical base of the xAPIC register window.
    pub fn address(&self) -> PhysAddr {
        PhysAddr((self.0 & 0x000f_ffff_ffff_f000) as usize)
    }

    /// The value that globally enables the APIC at the same base address, optionally in x2APIC mode.
    /// All other bits, the BSP flag included, are written as zero.
    pub fn enabled(&self, x2apic: bool) -> ApicBase {
        ApicBase(self.address().0 as u64)
            .with_flag(Self::ENABLE, true)
            .with_flag(Self::EXTD, x2apic)
    }

    fn with_flag(self, bit: u32, value: bool) -> ApicBase {
        ApicBase(self.0.with_bit(bit, value))
    }
}
