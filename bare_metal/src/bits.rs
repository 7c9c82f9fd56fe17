//! Bit-field access on plain integers.
//!
//! Hardware records (page-table entries, descriptors, APIC registers) are kept as fixed-width
//! integers and their fields are read and written through these helpers instead of relying on
//! compiler bit-field layout.

use core::ops::RangeInclusive;

pub trait Bits: Sized + Copy {
    fn get_bit(self, idx: u32) -> bool;
    fn set_bit(&mut self, idx: u32, value: bool);

    /// Extract the inclusive bit range `bits`, shifted down to bit 0.
    fn get_bits(self, bits: RangeInclusive<u32>) -> Self;

    /// Replace the inclusive bit range `bits` with the low bits of `value`.
    /// Bits of `value` that do not fit into the range are discarded.
    fn set_bits(&mut self, bits: RangeInclusive<u32>, value: Self);

    fn with_bit(mut self, idx: u32, value: bool) -> Self {
        self.set_bit(idx, value);
        self
    }

    fn with_bits(mut self, bits: RangeInclusive<u32>, value: Self) -> Self {
        self.set_bits(bits, value);
        self
    }
}

macro_rules! impl_bits {
    ($int:ty) => {
        impl Bits for $int {
            #[inline(always)]
            fn get_bit(self, idx: u32) -> bool {
                self & (1 << idx) != 0
            }

            #[inline(always)]
            fn set_bit(&mut self, idx: u32, value: bool) {
                if value {
                    *self |= 1 << idx;
                } else {
                    *self &= !(1 << idx);
                }
            }

            #[inline(always)]
            fn get_bits(self, bits: RangeInclusive<u32>) -> Self {
                let (low, high) = (*bits.start(), *bits.end());
                (self >> low) & field_mask!($int, high - low + 1)
            }

            #[inline(always)]
            fn set_bits(&mut self, bits: RangeInclusive<u32>, value: Self) {
                let (low, high) = (*bits.start(), *bits.end());
                let mask = field_mask!($int, high - low + 1);
                *self = (*self & !(mask << low)) | ((value & mask) << low);
            }
        }
    };
}

/// All-ones mask of the given width, which may be the full width of the type.
macro_rules! field_mask {
    ($int:ty, $width:expr) => {
        match $width {
            w if w >= <$int>::max_value().count_ones() => <$int>::max_value(),
            w => ((1 as $int) << w) - 1,
        }
    };
}

impl_bits!(u8);
impl_bits!(u16);
impl_bits!(u32);
impl_bits!(u64);
impl_bits!(usize);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_bits() {
        let sivr: u32 = 39 | 1 << 8;
        assert!(sivr.get_bit(8));
        assert!(!sivr.get_bit(9));
        assert_eq!(0_u64.with_bit(63, true), 0x8000_0000_0000_0000);
        assert_eq!(u16::max_value().with_bit(0, false), 0xfffe);
    }

    #[test]
    fn ranges() {
        let icr: u64 = 0x0200_0000_0000_d608;
        assert_eq!(icr.get_bits(0..=7), 0x08);
        assert_eq!(icr.get_bits(8..=10), 0b110);
        assert_eq!(icr.get_bits(56..=63), 2);
        assert_eq!(icr.get_bits(0..=63), icr);
    }

    #[test]
    fn range_replacement() {
        let mut entry: u64 = 0xffff_ffff_ffff_ffff;
        entry.set_bits(12..=47, 0);
        assert_eq!(entry, 0xffff_0000_0000_0fff);
        entry.set_bits(12..=47, 0x1_2345_6789);
        assert_eq!(entry.get_bits(12..=47), 0x1_2345_6789);
        // oversized values are truncated to the field width
        let mut dcr: u32 = 0;
        dcr.set_bits(0..=1, 0b111);
        assert_eq!(dcr, 0b11);
        assert_eq!(0_u8.with_bits(0..=7, 0xa5), 0xa5);
    }
}
