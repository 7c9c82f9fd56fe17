pub mod io;
pub mod msr;

use core::arch::asm;

use crate::bits::Bits;
use crate::VirtAddr;

/// Pause the CPU until the next interrupt arrives.
#[inline]
pub unsafe fn hlt() {
    asm!("hlt", options(nomem, nostack));
}

/// Pause the CPU indefintely. Interrupts may still arrive,
/// depending on the interrupt flags of the CPU.
#[inline]
pub unsafe fn hang() -> ! {
    loop {
        hlt();
    }
}

/// Execute the cpuid instruction after setting eax to the given query.
#[inline]
pub fn cpuid(leaf: u32) -> (u32, u32, u32, u32) {
    let result = unsafe { core::arch::x86_64::__cpuid(leaf) };
    (result.eax, result.ebx, result.ecx, result.edx)
}

/// The subset of `cpuid(1)` feature flags the boot code cares about.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Features {
    /// EDX bit 9: an on-chip local APIC exists.
    pub apic: bool,
    /// ECX bit 21: the local APIC supports x2APIC mode.
    pub x2apic: bool,
}

impl Features {
    pub fn from_leaf1(ecx: u32, edx: u32) -> Features {
        Features {
            apic: edx.get_bit(9),
            x2apic: ecx.get_bit(21),
        }
    }

    pub fn current() -> Features {
        let (_, _, ecx, edx) = cpuid(1);
        Features::from_leaf1(ecx, edx)
    }
}

/// Write back all modified cache lines without invalidating them.
#[inline]
pub unsafe fn wbnoinvd() {
    asm!("wbnoinvd", options(nostack, preserves_flags));
}

/// Drop the TLB entry for the page containing `vaddr`.
#[inline]
pub unsafe fn invlpg(vaddr: VirtAddr) {
    asm!("invlpg [{}]", in(reg) vaddr.0, options(nostack, preserves_flags));
}

/// Physical address of the active top-level page table.
#[inline]
pub fn read_cr3() -> u64 {
    let value: u64;
    unsafe {
        asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value & 0x000f_ffff_ffff_f000
}
