//! This module provides functionality for building the four-level page tables.
//!
//! Tables are never walked through raw pointers directly. A `TableAccessor` hands out the
//! table responsible for a virtual address at a given level, which lets the same walking code
//! run on top of the recursive mapping in the kernel and on plain host memory in the tests.

pub mod entry;
pub mod recursive;

use core::ops;

use bare_metal::{PhysAddr, VirtAddr};

use crate::physical::alloc::PageFrameAllocator;
use crate::physical::PageFrame;

pub use self::entry::{EntryFlags, PageTableEntry};
pub use self::recursive::RecursiveMapping;

/// Index of a level in the page table hierarchy. 0 represents the lowest level (4K pages).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(pub u32);

impl Level {
    /// Page Table level
    pub const PT: Level = Level(0);
    /// Page Directory level
    pub const PD: Level = Level(1);
    /// Page Directory Pointer level
    pub const PDP: Level = Level(2);
    /// Page Map Table Level 4 level
    pub const PML4: Level = Level(3);

    /// The child level in the page table hierarchy, if the current level is not the leaf level (0).
    pub fn child(&self) -> Option<Level> {
        if self.0 == 0 {
            None
        } else {
            Some(Level(self.0 - 1))
        }
    }
}

/// Mask for extracting the 9-bit index into a page table.
const INDEX_MASK: usize = 0x1FF;
/// Width of the index in bits.
const INDEX_BIT_WIDTH: u32 = 9;
/// Number of entries in a table at any level.
pub const ENTRY_COUNT: usize = 512;

/// Return the index in the page table at the given level (0 is PT, 3 is PML4)
/// that is responsible for mapping the given virtual address.
pub fn index_at_level(level: Level, vaddr: VirtAddr) -> usize {
    (vaddr.0 >> (crate::PAGE_ALIGN_BITS + INDEX_BIT_WIDTH * level.0)) & INDEX_MASK
}

bitflags! {
    /// What the caller asks for when mapping a page.
    pub struct MapFlags: u32 {
        /// The page may be written.
        const WRITABLE = 1 << 0;
        /// Memory mapped device registers: caching is disabled and writes go through.
        const DEVICE   = 1 << 1;
        /// The mapping belongs to the kernel and is kept across address space switches.
        const KERNEL   = 1 << 2;
    }
}

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum MapError {
    /// There is no memory left for allocating new page tables.
    OutOfMemory,
    /// A huge page already covers the address at the given level.
    HugePageConflict(Level),
    /// The requested range runs past the end of the address space.
    AddressOverflow,
}

/// One page table at any level of the hierarchy.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRY_COUNT],
}

assert_eq_size!(page_table_size; PageTable, [u8; 4096]);

impl PageTable {
    pub const fn new() -> PageTable {
        PageTable {
            entries: [PageTableEntry::new(); ENTRY_COUNT],
        }
    }

    /// Clear every entry of the table.
    pub fn zero(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = PageTableEntry::new();
        }
    }

    pub fn entries(&self) -> &[PageTableEntry] {
        &self.entries
    }
}

impl ops::Index<usize> for PageTable {
    type Output = PageTableEntry;

    fn index(&self, index: usize) -> &PageTableEntry {
        &self.entries[index]
    }
}

impl ops::IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut PageTableEntry {
        &mut self.entries[index]
    }
}

/// Access to the page tables of the current address space.
pub trait TableAccessor {
    /// The table at `level` that is responsible for `vaddr`.
    ///
    /// # Safety
    ///
    /// All tables above `level` on the path to `vaddr` must be present.
    unsafe fn table(&mut self, level: Level, vaddr: VirtAddr) -> &mut PageTable;

    /// Flush the translation of `vaddr` after its leaf entry changed.
    unsafe fn invalidate(&mut self, vaddr: VirtAddr);

    /// Make the freshly linked table at `level` for `vaddr` reachable through `table`.
    unsafe fn invalidate_table(&mut self, level: Level, vaddr: VirtAddr);
}

impl<'a, T: TableAccessor + ?Sized> TableAccessor for &'a mut T {
    unsafe fn table(&mut self, level: Level, vaddr: VirtAddr) -> &mut PageTable {
        (**self).table(level, vaddr)
    }

    unsafe fn invalidate(&mut self, vaddr: VirtAddr) {
        (**self).invalidate(vaddr)
    }

    unsafe fn invalidate_table(&mut self, level: Level, vaddr: VirtAddr) {
        (**self).invalidate_table(level, vaddr)
    }
}

/// Map the 4K page at `vaddr` to `frame`, allocating intermediate tables as needed.
///
/// Intermediate entries are always present, writable and supervisor-only. Mapping the null
/// address does nothing. If the frame pool runs dry halfway, the tables allocated so far stay
/// linked; they are empty and therefore harmless.
pub unsafe fn map_page<T, A>(
    tables: &mut T, frames: &mut A, vaddr: VirtAddr, frame: PageFrame, flags: MapFlags,
) -> Result<(), MapError>
where
    T: TableAccessor + ?Sized,
    A: PageFrameAllocator + ?Sized,
{
    if vaddr.is_null() {
        return Ok(());
    }
    trace!("[VMM] map({:p}, {:p}, {:?})", vaddr, frame.start_address(), flags);

    let mut level = Level::PML4;
    while let Some(child) = level.child() {
        let index = index_at_level(level, vaddr);
        let entry = tables.table(level, vaddr)[index];

        if !entry.present() {
            let new_table = frames.alloc().ok_or(MapError::OutOfMemory)?;
            trace!("[VMM] new table at level {} in frame {:#x}", child.0, new_table.0);
            tables.table(level, vaddr)[index] = PageTableEntry::table(new_table);
            tables.invalidate_table(child, vaddr);
            tables.table(child, vaddr).zero();
        } else if entry.flags().contains(EntryFlags::HUGE_OR_PAT) {
            return Err(MapError::HugePageConflict(level));
        }
        level = child;
    }

    tables.table(Level::PT, vaddr)[index_at_level(Level::PT, vaddr)] = PageTableEntry::leaf(frame, flags);
    tables.invalidate(vaddr);
    Ok(())
}

/// The leaf entry mapping `vaddr`, if every level on the way is present.
pub unsafe fn leaf_entry<T>(tables: &mut T, vaddr: VirtAddr) -> Option<PageTableEntry>
where
    T: TableAccessor + ?Sized,
{
    let mut level = Level::PML4;
    loop {
        let entry = tables.table(level, vaddr)[index_at_level(level, vaddr)];
        if !entry.present() {
            return None;
        }
        match level.child() {
            Some(child) if !entry.flags().contains(EntryFlags::HUGE_OR_PAT) => level = child,
            _ => return Some(entry),
        }
    }
}

/// Resolve a virtual address to the physical address it is mapped to.
pub unsafe fn resolve<T>(tables: &mut T, vaddr: VirtAddr) -> Option<PhysAddr>
where
    T: TableAccessor + ?Sized,
{
    let mut level = Level::PML4;
    loop {
        let entry = tables.table(level, vaddr)[index_at_level(level, vaddr)];
        if !entry.present() {
            return None;
        }
        let huge = level > Level::PT && entry.flags().contains(EntryFlags::HUGE_OR_PAT);
        if level == Level::PT || huge {
            let offset_mask = (1 << (crate::PAGE_ALIGN_BITS + INDEX_BIT_WIDTH * level.0)) - 1;
            let base = entry.frame().start_address().0 & !offset_mask;
            return Some(PhysAddr(base + (vaddr.0 & offset_mask)));
        }
        level = level.child()?;
    }
}
