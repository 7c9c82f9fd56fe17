use core::arch::asm;

/// A model-specific register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Msr(pub u32);

pub const IA32_APIC_BASE: Msr = Msr(0x1B);
pub const IA32_GS_BASE: Msr = Msr(0xC000_0101);
pub const IA32_KERNEL_GS_BASE: Msr = Msr(0xC000_0102);

impl Msr {
    /// Read the value of a model specific register
    #[inline(always)]
    pub unsafe fn read(self) -> u64 {
        let lo: u32;
        let hi: u32;
        asm!("rdmsr", in("ecx") self.0, out("eax") lo, out("edx") hi, options(nomem, nostack, preserves_flags));
        (lo as u64) | ((hi as u64) << 32)
    }

    /// Write the value of a model specific register
    #[inline(always)]
    pub unsafe fn write(self, value: u64) {
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        asm!("wrmsr", in("ecx") self.0, in("eax") lo, in("edx") hi, options(nostack, preserves_flags));
    }
}
