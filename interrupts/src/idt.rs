use core::arch::asm;
use core::mem;
use core::ops;

use bare_metal::segments::{Ring, Selector};

/// Number of vectors reserved for architectural exceptions.
pub const EXCEPTION_COUNT: usize = 32;
/// Number of entries in a full IDT.
pub const ENTRY_COUNT: usize = 256;

/// Load an IDT for the current CPU.
///
/// The table must stay alive and in place for as long as it is loaded.
pub unsafe fn load_idt(idt: &Idt) {
    let idtr = Idtr {
        limit: mem::size_of::<Idt>() as u16 - 1,
        offset: idt as *const Idt as u64,
    };
    asm!("lidt [{}]", in(reg) &idtr, options(readonly, nostack, preserves_flags));
}

/// IDT Register value
#[repr(C, packed)]
pub struct Idtr {
    limit: u16,
    offset: u64,
}

/// Interrupt descriptor table
#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; ENTRY_COUNT],
}

// sanity check that everything adds up in terms of size
assert_eq_size!(idt_size; Idt, [u64; 512]);

impl Idt {
    pub const fn new() -> Idt {
        Idt {
            entries: [IdtEntry::empty(); ENTRY_COUNT],
        }
    }

    /// Install an interrupt gate for `vector`.
    pub fn set_handler(&mut self, vector: u8, selector: Selector, handler: usize, ist: u8, dpl: Ring) {
        let entry = &mut self[vector];
        entry.set_gate_type(GateType::INTERRUPT_GATE);
        entry.set_selector(selector);
        entry.set_handler_address(handler);
        entry.set_ist(ist);
        entry.set_descriptor_privilege(dpl);
        entry.set_present(true);
    }

    /// Fill every vector: exceptions get their dedicated stubs, each `(vector, handler)` pair of
    /// `dedicated` its own stub and all remaining vectors share `catch_all`. All gates are ring 0
    /// on the normal stack.
    pub fn populate(
        &mut self, selector: Selector, exceptions: &[usize; EXCEPTION_COUNT],
        dedicated: &[(u8, usize)], catch_all: usize,
    ) {
        for vector in 0..ENTRY_COUNT {
            let handler = if vector < EXCEPTION_COUNT {
                exceptions[vector]
            } else {
                dedicated.iter()
                    .find(|&&(v, _)| v as usize == vector)
                    .map_or(catch_all, |&(_, handler)| handler)
            };
            self.set_handler(vector as u8, selector, handler, 0, Ring::RING0);
        }
        debug!("[IDT] {} vectors installed, {} with their own stub", ENTRY_COUNT, EXCEPTION_COUNT + dedicated.len());
    }

    /// Whether every vector has a present gate.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.present())
    }
}

impl ops::Index<u8> for Idt {
    type Output = IdtEntry;

    fn index(&self, idx: u8) -> &IdtEntry {
        &self.entries[idx as usize]
    }
}

impl ops::IndexMut<u8> for Idt {
    fn index_mut(&mut self, idx: u8) -> &mut IdtEntry {
        &mut self.entries[idx as usize]
    }
}

/// An entry in the interrupt descriptor table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(C, packed)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    /// `[MBZ:5][IST:3]`
    ist: u8,
    /// `[P:1][DPL:2][MBZ:1][Type:4]`
    type_attr: u8,
    offset_middle: u16,
    offset_high: u32,
    reserved: u32,
}

// sanity check that everything adds up in terms of size
assert_eq_size!(idt_entry_size; IdtEntry, [u64; 2]);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GateType(u8);

impl GateType {
    pub const INTERRUPT_GATE: GateType = GateType(0x0E);
    pub const TRAP_GATE: GateType = GateType(0x0F);
}

impl IdtEntry {
    const IST_MASK: u8 = 0b0000_0111;
    const DPL_MASK: u8 = 0b0110_0000;
    const TYPE_MASK: u8 = 0b0000_1111;
    const PRESENT_MASK: u8 = 0b1000_0000;

    /// Create a new non-present, DPL 0 and empty IDT entry with the invalid selector 0.
    pub const fn empty() -> IdtEntry {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            ist: 0,
            type_attr: GateType::INTERRUPT_GATE.0,
            offset_middle: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    /// Return whether this entry is present.
    pub fn present(&self) -> bool {
        self.type_attr & Self::PRESENT_MASK != 0
    }

    /// Set the present bit of the entry.
    pub fn set_present(&mut self, value: bool) {
        if value {
            self.type_attr |= Self::PRESENT_MASK;
        } else {
            self.type_attr &= !Self::PRESENT_MASK;
        }
    }

    /// The handler address reassembled from its three pieces.
    pub fn handler_address(&self) -> usize {
        (self.offset_low as usize) |
            ((self.offset_middle as usize) << 16) |
            ((self.offset_high as usize) << 32)
    }

    pub fn set_handler_address(&mut self, addr: usize) {
        self.offset_low = (addr & 0xFFFF) as u16;
        self.offset_middle = ((addr >> 16) & 0xFFFF) as u16;
        self.offset_high = ((addr >> 32) & 0xFFFF_FFFF) as u32;
    }

    /// Offset in the GDT that determines the segment used for this gate.
    pub fn selector(&self) -> Selector {
        Selector(self.selector)
    }

    pub fn set_selector(&mut self, selector: Selector) {
        self.selector = selector.0
    }

    /// Interrupt stack table slot, 0 meaning the current stack.
    pub fn ist(&self) -> u8 {
        self.ist & Self::IST_MASK
    }

    pub fn set_ist(&mut self, ist: u8) {
        self.ist = ist & Self::IST_MASK
    }

    pub fn gate_type(&self) -> GateType {
        GateType(self.type_attr & Self::TYPE_MASK)
    }

    pub fn set_gate_type(&mut self, gate_type: GateType) {
        self.type_attr = (self.type_attr & !Self::TYPE_MASK) | gate_type.0
    }

    /// The privilege level required to call this gate.
    pub fn descriptor_privilege(&self) -> Ring {
        // two bits always form a valid ring
        Ring::new((self.type_attr & Self::DPL_MASK) >> 5).unwrap_or(Ring::RING0)
    }

    pub fn set_descriptor_privilege(&mut self, descriptor_privilege: Ring) {
        self.type_attr = (self.type_attr & !Self::DPL_MASK) | ((descriptor_privilege.number() << 5) & Self::DPL_MASK)
    }
}
