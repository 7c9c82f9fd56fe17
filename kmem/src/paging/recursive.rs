//! Page table access through a recursive entry in the PML4.
//!
//! If entry `r` of the PML4 points back at the PML4 itself, every table of the current
//! address space shows up at a fixed virtual address: the PML4 at `r/r/r/r`, a PDP at
//! `r/r/r/i4`, and so on.

use bare_metal::cpu;
use bare_metal::{Alignable, VirtAddr};

use super::{Level, PageTable, TableAccessor, INDEX_BIT_WIDTH};

/// Provides access to the current address space, assuming a recursive mapping at the given index.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RecursiveMapping {
    recursive_index: usize,
}

impl RecursiveMapping {
    /// Returns `None` for indices outside the PML4.
    pub const fn new(recursive_index: usize) -> Option<Self> {
        if recursive_index < super::ENTRY_COUNT {
            Some(RecursiveMapping { recursive_index })
        } else {
            None
        }
    }

    pub fn recursive_index(&self) -> usize {
        self.recursive_index
    }

    /// Return the virtual address of the page table at the given level (0 is PT, 3 is PML4)
    /// that contains the entry for the virtual address in question.
    pub fn table_at_level(&self, level: Level, vaddr: VirtAddr) -> VirtAddr {
        // compute the address of the entry, then align to page boundary
        self.entry_at_level(level, vaddr).align_down(crate::PAGE_SIZE)
    }

    /// Return the virtual address of the page table entry at the given level (0 is PT, 3 is PML4)
    /// that contains the entry for the virtual address in question.
    pub fn entry_at_level(&self, level: Level, vaddr: VirtAddr) -> VirtAddr {
        const CLEAR_PML4_MASK: usize = 0xFFFF_007F_FFFF_FFFF;
        let set_pml4_index_mask: usize = self.recursive_index << (3 * INDEX_BIT_WIDTH + crate::PAGE_ALIGN_BITS);
        let mut addr: usize = vaddr.0;

        for _current_level in 0..=level.0 {
            addr = ((addr >> INDEX_BIT_WIDTH) & CLEAR_PML4_MASK) | set_pml4_index_mask;
        }

        // make sure address is canonical
        if self.recursive_index >= 256 {
            addr |= 0xFFFF_0000_0000_0000;
        } else {
            addr &= 0x0000_FFFF_FFFF_FFFF;
        }
        // align to table entry
        addr &= 0xFFFF_FFFF_FFFF_FFF8;

        VirtAddr(addr)
    }
}

impl TableAccessor for RecursiveMapping {
    unsafe fn table(&mut self, level: Level, vaddr: VirtAddr) -> &mut PageTable {
        &mut *self.table_at_level(level, vaddr).as_mut_ptr()
    }

    unsafe fn invalidate(&mut self, vaddr: VirtAddr) {
        cpu::wbnoinvd();
        cpu::invlpg(vaddr);
    }

    unsafe fn invalidate_table(&mut self, level: Level, vaddr: VirtAddr) {
        let window = self.table_at_level(level, vaddr);
        cpu::wbnoinvd();
        cpu::invlpg(window);
    }
}
