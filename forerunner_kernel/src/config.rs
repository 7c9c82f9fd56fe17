//! Compile time configuration of the kernel.

use bare_metal::segments::Selector;
use bare_metal::{PhysAddr, VirtAddr};
use log::LevelFilter;

/// Number of CPUs the kernel keeps records for. Cores beyond this are never started.
pub const MAX_CPU: usize = 4;

pub const PAGE_SIZE: usize = kmem::PAGE_SIZE;

/// Physical address the AP startup code is copied to. Must be page aligned and below 1M.
pub const TRAMPOLINE_ADDR: PhysAddr = PhysAddr(0x8000);

/// AP stacks grow down from here, one slot of `AP_STACK_STRIDE` bytes per CPU.
pub const AP_STACK_BASE: VirtAddr = VirtAddr(0xffff_c000_0000_0000);
/// 16K of stack plus a 4K unmapped guard page.
pub const AP_STACK_STRIDE: usize = 0x5000;
pub const AP_STACK_SIZE: usize = 0x4000;

pub const TIMER_FREQUENCY_HZ: u32 = 1000;
pub const TIMER_VECTOR: u8 = 32;
pub const SPURIOUS_VECTOR: u8 = 39;

/// The 8259s are moved out of the exception range before they are masked.
pub const PIC_MASTER_OFFSET: u8 = 0x40;
pub const PIC_SLAVE_OFFSET: u8 = 0x48;

pub const KERNEL_CODE_SELECTOR: Selector = Selector::KERNEL_CODE;
/// `gs` selector of CPU 0; every CPU owns three GDT slots.
pub const GS_SELECTOR_BASE: u16 = 0x98;
/// TSS selector of CPU 0.
pub const TSS_SELECTOR_BASE: u16 = 0xa0;
pub const GDT_STRIDE: u16 = 24;

/// How often the BSP polls a starting AP before giving up on it.
pub const AP_STARTUP_SPIN_LIMIT: u64 = 100_000_000;
/// How often the PIT output is polled during APIC timer calibration.
pub const CALIBRATION_SPIN_LIMIT: u64 = 100_000_000;

pub const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/// PML4 slot that points back at the PML4.
pub const RECURSIVE_INDEX: usize = 511;

/// Top of the stack of AP `index`. The slot below the top stays unmapped as a guard.
pub fn ap_stack_top(index: usize) -> VirtAddr {
    VirtAddr(AP_STACK_BASE.0 - AP_STACK_STRIDE * index)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stacks_do_not_overlap() {
        assert_eq!(ap_stack_top(1), VirtAddr(0xffff_bfff_ffff_b000));
        assert_eq!(ap_stack_top(2), VirtAddr(0xffff_bfff_ffff_6000));
        for i in 1..MAX_CPU {
            let bottom = ap_stack_top(i).0 - AP_STACK_SIZE;
            assert!(bottom > ap_stack_top(i + 1).0);
        }
    }
}
