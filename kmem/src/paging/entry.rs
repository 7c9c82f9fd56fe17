use bare_metal::bits::Bits;

use super::MapFlags;
use crate::physical::PageFrame;

bitflags! {
    /// The single-bit attributes of a page table entry.
    pub struct EntryFlags: u64 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const CACHE_DISABLE = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        /// PAT bit in a PT entry, page size bit in PD and PDP entries.
        const HUGE_OR_PAT   = 1 << 7;
        const GLOBAL        = 1 << 8;
        /// Ignored by the CPU, marks kernel-owned mappings.
        const KERNEL        = 1 << 9;
        const NO_EXECUTE    = 1 << 63;
    }
}

/// An entry in a page table at any of the four levels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

assert_eq_size!(pte_size; PageTableEntry, u64);

impl PageTableEntry {
    const AVAILABLE_BITS: core::ops::RangeInclusive<u32> = 10..=11;
    const FRAME_BITS: core::ops::RangeInclusive<u32> = 12..=47;
    const SOFTWARE_BITS: core::ops::RangeInclusive<u32> = 52..=62;

    pub const fn new() -> Self {
        PageTableEntry(0)
    }

    pub const fn from_raw(raw: u64) -> Self {
        PageTableEntry(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// An entry referring to a child table. Intermediate tables are always present,
    /// writable and supervisor-only; the leaf decides the effective permissions.
    pub fn table(child: PageFrame) -> Self {
        let mut entry = PageTableEntry::new();
        entry.set_frame(child);
        entry.set_flags(EntryFlags::PRESENT | EntryFlags::WRITABLE);
        entry
    }

    /// A present leaf entry for a 4K page.
    ///
    /// The user bit stays clear for every flag combination. Kernel and device pages are
    /// supervisor-only, and there is no user space during boot.
    pub fn leaf(frame: PageFrame, map: MapFlags) -> Self {
        let mut flags = EntryFlags::PRESENT;
        if map.contains(MapFlags::WRITABLE) {
            flags |= EntryFlags::WRITABLE;
        }
        if map.contains(MapFlags::DEVICE) {
            flags |= EntryFlags::CACHE_DISABLE | EntryFlags::WRITE_THROUGH;
        }
        if map.contains(MapFlags::KERNEL) {
            flags |= EntryFlags::KERNEL | EntryFlags::GLOBAL;
        }
        let mut entry = PageTableEntry::new();
        entry.set_frame(frame);
        entry.set_flags(flags);
        entry
    }

    pub fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0)
    }

    /// Replace all single-bit attributes, keeping the frame and software fields.
    pub fn set_flags(&mut self, flags: EntryFlags) {
        self.0 = (self.0 & !EntryFlags::all().bits()) | flags.bits();
    }

    pub fn present(&self) -> bool {
        self.flags().contains(EntryFlags::PRESENT)
    }

    /// The 36-bit frame number. Undefined for non-present entries.
    pub fn frame(&self) -> PageFrame {
        PageFrame(self.0.get_bits(Self::FRAME_BITS) as usize)
    }

    pub fn set_frame(&mut self, frame: PageFrame) {
        self.0.set_bits(Self::FRAME_BITS, frame.0 as u64);
    }

    /// The two bits at 10..=11 available to software.
    pub fn available(&self) -> u8 {
        self.0.get_bits(Self::AVAILABLE_BITS) as u8
    }

    pub fn set_available(&mut self, value: u8) {
        self.0.set_bits(Self::AVAILABLE_BITS, value as u64);
    }

    /// The eleven bits at 52..=62 available to software.
    pub fn software(&self) -> u16 {
        self.0.get_bits(Self::SOFTWARE_BITS) as u16
    }

    pub fn set_software(&mut self, value: u16) {
        self.0.set_bits(Self::SOFTWARE_BITS, value as u64);
    }
}

impl Default for PageTableEntry {
    fn default() -> Self {
        PageTableEntry::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_table_entry_accessors() {
        let mut pte = PageTableEntry::new();

        let flags = EntryFlags::PRESENT | EntryFlags::GLOBAL | EntryFlags::KERNEL | EntryFlags::NO_EXECUTE;
        let frame = PageFrame(0xf_ffff_ffff);

        pte.set_software(0x7ff);
        pte.set_flags(flags);
        pte.set_frame(frame);
        pte.set_available(0b10);

        assert_eq!(pte.software(), 0x7ff, "software bits roundtrip failed");
        assert_eq!(pte.flags(), flags, "flag roundtrip failed");
        assert_eq!(pte.frame(), frame, "frame roundtrip failed");
        assert_eq!(pte.available(), 0b10);

        // set fields in a different order now
        pte.set_frame(PageFrame(0xfee00));
        pte.set_flags(EntryFlags::PRESENT);
        assert_eq!(pte.software(), 0x7ff);
        assert_eq!(pte.frame(), PageFrame(0xfee00));
        assert_eq!(pte.raw() & 0xfff, 0b10_0000_0001);
    }

    #[test]
    fn leaf_for_device_memory() {
        let pte = PageTableEntry::leaf(PageFrame(0xfee00), MapFlags::WRITABLE | MapFlags::DEVICE | MapFlags::KERNEL);
        assert_eq!(pte.raw(), 0xfee0_0000 | 0b11_0001_1011);
        assert_eq!(PageTableEntry::leaf(PageFrame(2), MapFlags::empty()).raw(), 0x2001);
    }

    #[test]
    fn leaves_are_supervisor_only() {
        let all = MapFlags::WRITABLE | MapFlags::DEVICE | MapFlags::KERNEL;
        for bits in 0..=all.bits() {
            let map = MapFlags::from_bits_truncate(bits);
            let pte = PageTableEntry::leaf(PageFrame(0x1234), map);
            assert!(!pte.flags().contains(EntryFlags::USER), "user bit set for {:?}", map);
        }
        let kernel = PageTableEntry::leaf(PageFrame(0x1234), MapFlags::KERNEL);
        assert_eq!(kernel.flags(), EntryFlags::PRESENT | EntryFlags::KERNEL | EntryFlags::GLOBAL);
    }

    #[test]
    fn bit_positions() {
        assert_eq!(PageTableEntry::table(PageFrame(1)).raw(), 0x1003);
        let mut pte = PageTableEntry::new();
        pte.set_frame(PageFrame(1 << 36));
        // the frame field is 36 bits wide, the excess does not leak into reserved bits
        assert_eq!(pte.raw(), 0);
    }
}
