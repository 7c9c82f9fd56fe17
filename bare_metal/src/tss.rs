//! The 64-bit Task State Segment and its GDT system descriptor.

use core::mem;

use crate::bits::Bits;

/// 64-bit TSS. Every 64-bit slot is split into two 32-bit halves because the structure
/// is only 4-byte aligned in hardware.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(C, packed)]
pub struct Tss {
    reserved0: u32,
    rsp: [u32; 6],
    reserved1: u32,
    reserved2: u32,
    ist: [u32; 14],
    reserved3: u32,
    reserved4: u32,
    reserved5: u16,
    io_map_base: u16,
}

assert_eq_size!(tss_size; Tss, [u8; 104]);

impl Tss {
    pub const fn new() -> Tss {
        Tss {
            reserved0: 0,
            rsp: [0; 6],
            reserved1: 0,
            reserved2: 0,
            ist: [0; 14],
            reserved3: 0,
            reserved4: 0,
            reserved5: 0,
            // no I/O permission bitmap
            io_map_base: mem::size_of::<Tss>() as u16,
        }
    }

    /// Stack pointer loaded when entering privilege level `ring` (0..=2).
    pub fn rsp(&self, ring: usize) -> u64 {
        let rsp = self.rsp;
        join(rsp[ring * 2], rsp[ring * 2 + 1])
    }

    pub fn set_rsp(&mut self, ring: usize, top: u64) {
        let mut rsp = self.rsp;
        rsp[ring * 2] = top as u32;
        rsp[ring * 2 + 1] = (top >> 32) as u32;
        self.rsp = rsp;
    }

    /// Interrupt stack table slot `index` (1..=7).
    pub fn ist(&self, index: usize) -> u64 {
        let ist = self.ist;
        join(ist[(index - 1) * 2], ist[(index - 1) * 2 + 1])
    }

    pub fn set_ist(&mut self, index: usize, top: u64) {
        let mut ist = self.ist;
        ist[(index - 1) * 2] = top as u32;
        ist[(index - 1) * 2 + 1] = (top >> 32) as u32;
        self.ist = ist;
    }

    pub fn io_map_base(&self) -> u16 {
        self.io_map_base
    }
}

fn join(lo: u32, hi: u32) -> u64 {
    (lo as u64) | ((hi as u64) << 32)
}

/// The 16-byte GDT descriptor of an available 64-bit TSS.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TssDescriptor {
    pub low: u64,
    pub high: u64,
}

impl TssDescriptor {
    const TYPE_AVAILABLE_TSS: u64 = 0x9;

    pub fn new(base: u64) -> TssDescriptor {
        let limit = (mem::size_of::<Tss>() - 1) as u64;
        let mut low = 0_u64;
        low.set_bits(0..=15, limit);
        low.set_bits(16..=39, base);
        low.set_bits(40..=43, Self::TYPE_AVAILABLE_TSS);
        low.set_bit(47, true);
        low.set_bits(48..=51, limit >> 16);
        low.set_bits(56..=63, base >> 24);
        TssDescriptor {
            low,
            high: base >> 32,
        }
    }

    pub fn base(&self) -> u64 {
        self.low.get_bits(16..=39) | (self.low.get_bits(56..=63) << 24) | (self.high << 32)
    }

    pub fn limit(&self) -> u64 {
        self.low.get_bits(0..=15) | (self.low.get_bits(48..=51) << 16)
    }
}
