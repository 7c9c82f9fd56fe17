//! Per-CPU entries of the GDT.
//!
//! The GDT itself is set up by the loader and exported as `gdtFinal`. From selector 0x98 on,
//! every CPU owns three slots: its `gs` data segment followed by its 16-byte TSS descriptor.

use bare_metal::segments::Selector;
use bare_metal::tss::{Tss, TssDescriptor};

use crate::config::{GDT_STRIDE, GS_SELECTOR_BASE, TSS_SELECTOR_BASE};

pub fn gs_selector(cpu: usize) -> Selector {
    Selector(GS_SELECTOR_BASE + GDT_STRIDE * cpu as u16)
}

pub fn tss_selector(cpu: usize) -> Selector {
    Selector(TSS_SELECTOR_BASE + GDT_STRIDE * cpu as u16)
}

/// Store the descriptor of `tss` in the two slots of `selector`.
pub fn write_tss_descriptor(gdt: &mut [u64], selector: Selector, tss: &Tss) {
    let descriptor = TssDescriptor::new(tss as *const Tss as u64);
    let slot = selector.index() as usize;
    gdt[slot] = descriptor.low;
    gdt[slot + 1] = descriptor.high;
}

/// Install the TSS descriptor of `cpu` in the loader's GDT.
#[cfg(not(test))]
pub unsafe fn install_tss(cpu: usize, tss: &Tss) {
    extern "C" {
        #[allow(non_upper_case_globals)]
        static mut gdtFinal: u64;
    }
    let selector = tss_selector(cpu);
    let gdt = core::slice::from_raw_parts_mut(core::ptr::addr_of_mut!(gdtFinal), selector.index() as usize + 2);
    write_tss_descriptor(gdt, selector, tss);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn selectors_per_cpu() {
        assert_eq!(gs_selector(0), Selector(0x98));
        assert_eq!(tss_selector(0), Selector(0xa0));
        assert_eq!(gs_selector(1), Selector(0xb0));
        assert_eq!(tss_selector(1), Selector(0xb8));
        assert_eq!(tss_selector(3).index(), 20 + 9);
    }

    #[test]
    fn descriptor_lands_in_both_slots() {
        let tss = Box::new(Tss::new());
        let mut gdt = [0u64; 32];
        write_tss_descriptor(&mut gdt, tss_selector(1), &tss);

        let expected = TssDescriptor::new(&*tss as *const Tss as u64);
        assert_eq!(gdt[23], expected.low);
        assert_eq!(gdt[24], expected.high);
        assert_eq!(gdt[22], 0);
        assert_eq!(gdt[25], 0);
    }
}
