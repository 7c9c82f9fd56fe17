//! The legacy 8259 pair. It is only ever remapped out of the way of the exception vectors
//! and then masked completely, since all interrupts are routed through the local APIC.

use bare_metal::cpu::io::{PortIo, PortNumber};

pub const PIC1_CMD: PortNumber = PortNumber(0x0020);
pub const PIC1_DATA: PortNumber = PortNumber(0x0021);
pub const PIC2_CMD: PortNumber = PortNumber(0x00A0);
pub const PIC2_DATA: PortNumber = PortNumber(0x00A1);

/// ICW4
pub const ICW1_ICW4: u8 = 0x01;
/// Initialization
pub const ICW1_INIT: u8 = 0x10;

/// 8086/88 (MCS-80/85) mode
pub const ICW4_8086: u8 = 0x01;

const EOI: u8 = 0x20;

/// The master/slave PIC pair behind the given port accessor.
pub struct Pic<P> {
    ports: P,
}

impl<P: PortIo> Pic<P> {
    pub fn new(ports: P) -> Self {
        Pic { ports }
    }

    /// Reinitialize the PICs, mapping them to the given interupt vector offsets.
    pub unsafe fn remap(&mut self, pic1_offset: u8, pic2_offset: u8) {
        // ICW1: start initialization in cascade mode
        self.ports.write_u8(PIC1_CMD, ICW1_INIT | ICW1_ICW4);
        self.ports.write_u8(PIC2_CMD, ICW1_INIT | ICW1_ICW4);
        // ICW2: write new offsets
        self.ports.write_u8(PIC1_DATA, pic1_offset);
        self.ports.write_u8(PIC2_DATA, pic2_offset);
        // ICW3: setup master/slave connection
        self.ports.write_u8(PIC1_DATA, 1 << 2); // the slave is at IRQ2
        self.ports.write_u8(PIC2_DATA, 2); // cascade identity
        // ICW4: tell PICs that they're in 8086 mode
        self.ports.write_u8(PIC1_DATA, ICW4_8086);
        self.ports.write_u8(PIC2_DATA, ICW4_8086);
    }

    /// Return the IRQ masks for PIC1 and PIC2.
    pub unsafe fn masks(&mut self) -> (u8, u8) {
        (self.ports.read_u8(PIC1_DATA), self.ports.read_u8(PIC2_DATA))
    }

    /// Set the IRQ masks for PIC1 and PIC2.
    pub unsafe fn set_masks(&mut self, pic1_mask: u8, pic2_mask: u8) {
        self.ports.write_u8(PIC1_DATA, pic1_mask);
        self.ports.write_u8(PIC2_DATA, pic2_mask);
    }

    /// Remap to the given offsets and mask every line.
    pub unsafe fn disable(&mut self, pic1_offset: u8, pic2_offset: u8) {
        self.remap(pic1_offset, pic2_offset);
        self.set_masks(0xFF, 0xFF);
        debug!("[APIC] 8259 remapped to {:#x}/{:#x} and masked", pic1_offset, pic2_offset);
    }

    /// Notify PICs that the interrupt was handled.
    pub unsafe fn send_eoi(&mut self, irq: u8) {
        if irq >= 8 {
            // IRQs >= 8 went through both PICs.
            self.ports.write_u8(PIC2_CMD, EOI);
        }
        self.ports.write_u8(PIC1_CMD, EOI);
    }
}
