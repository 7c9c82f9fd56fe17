//! Local vector table entries and the timer divide configuration.

use bare_metal::bits::Bits;

/// One LVT register value.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct LvtEntry(pub u32);

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum TimerMode {
    OneShot = 0,
    Periodic = 0b01,
    TscDeadline = 0b10,
}

impl TimerMode {
    pub fn parse(value: u32) -> Option<TimerMode> {
        match value {
            0 => Some(TimerMode::OneShot),
            0b01 => Some(TimerMode::Periodic),
            0b10 => Some(TimerMode::TscDeadline),
            _ => None,
        }
    }
}

impl LvtEntry {
    const MASK_BIT: u32 = 16;

    /// A masked entry with vector 0.
    pub const fn disabled() -> LvtEntry {
        LvtEntry(1 << Self::MASK_BIT)
    }

    /// An unmasked timer entry.
    pub fn timer(vector: u8, mode: TimerMode) -> LvtEntry {
        let mut lvt = LvtEntry(0);
        lvt.set_vector(vector);
        lvt.set_timer_mode(mode);
        lvt
    }

    pub fn vector(&self) -> u8 {
        self.0.get_bits(0..=7) as u8
    }

    pub fn set_vector(&mut self, vec: u8) {
        self.0.set_bits(0..=7, vec as u32);
    }

    pub fn masked(&self) -> bool {
        self.0.get_bit(Self::MASK_BIT)
    }

    pub fn set_masked(&mut self, masked: bool) {
        self.0.set_bit(Self::MASK_BIT, masked);
    }

    pub fn timer_mode(&self) -> Option<TimerMode> {
        TimerMode::parse(self.0.get_bits(17..=18))
    }

    pub fn set_timer_mode(&mut self, mode: TimerMode) {
        self.0.set_bits(17..=18, mode as u32)
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum TimerDivisor {
    Divisor2 = 0b000,
    Divisor4 = 0b001,
    Divisor8 = 0b010,
    Divisor16 = 0b011,
    Divisor32 = 0b100,
    Divisor64 = 0b101,
    Divisor128 = 0b110,
    Divisor1 = 0b111,
}

impl TimerDivisor {
    /// The divide configuration register value. Bit 2 of the divisor code lives in bit 3.
    pub fn register_value(self) -> u32 {
        let code = self as u32;
        0u32.with_bits(0..=1, code.get_bits(0..=1)).with_bit(3, code.get_bit(2))
    }

    /// The divisor the timer applies to the bus clock.
    pub fn divisor(self) -> u32 {
        match self {
            TimerDivisor::Divisor1 => 1,
            other => 2 << (other as u32),
        }
    }
}
