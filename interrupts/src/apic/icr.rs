//! Encoding of the interrupt command register.

use bare_metal::bits::Bits;

/// How the addressed APICs act upon the IPI.
#[repr(u8)]
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum DeliveryMode {
    Fixed = 0b000,
    LowestPriority = 0b001,
    SMI = 0b010,
    NMI = 0b100,
    /// Put the target into its wait-for-SIPI state.
    Init = 0b101,
    /// Start the target in real mode at `vector << 12`.
    StartUp = 0b110,
}

/// The 64 bit ICR contents, independent of the APIC mode.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct Icr {
    low: u32,
    destination: u32,
}

impl Icr {
    const DELIVERY_STATUS: u32 = 12;
    const LEVEL_ASSERT: u32 = 14;
    const TRIGGER_LEVEL: u32 = 15;

    pub fn new(mode: DeliveryMode, vector: u8, destination: u32) -> Icr {
        let low = 0u32
            .with_bits(0..=7, vector as u32)
            .with_bits(8..=10, mode as u32);
        Icr { low, destination }
    }

    /// INIT IPI, level triggered and asserted: `0xd500`.
    pub fn init(destination: u32) -> Icr {
        Icr::new(DeliveryMode::Init, 0, destination).asserted_level()
    }

    /// Startup IPI for code at the page aligned physical address `start`: `0xd600 | start >> 12`.
    pub fn startup(destination: u32, start: usize) -> Icr {
        Icr::new(DeliveryMode::StartUp, ((start >> 12) & 0xff) as u8, destination).asserted_level()
    }

    fn asserted_level(mut self) -> Icr {
        self.low.set_bit(Self::DELIVERY_STATUS, true);
        self.low.set_bit(Self::LEVEL_ASSERT, true);
        self.low.set_bit(Self::TRIGGER_LEVEL, true);
        self
    }

    pub fn low(&self) -> u32 {
        self.low
    }

    pub fn vector(&self) -> u8 {
        self.low.get_bits(0..=7) as u8
    }

    pub fn destination(&self) -> u32 {
        self.destination
    }

    /// Raw value for the xAPIC, whose 8 bit destination lives in bits 56..=63.
    pub fn xapic_value(&self) -> u64 {
        (self.low as u64).with_bits(56..=63, self.destination as u64)
    }

    /// Raw value for the x2APIC, whose 32 bit destination lives in bits 32..=63.
    pub fn x2apic_value(&self) -> u64 {
        (self.low as u64) | ((self.destination as u64) << 32)
    }
}
