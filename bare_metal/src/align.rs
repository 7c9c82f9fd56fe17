/// Values (addresses, sizes, frame counts) that can be rounded to a power-of-two boundary.
pub trait Alignable: Sized + Copy {
    type Alignment;

    /// Round up to the next multiple of `alignment`. An alignment of zero leaves the value unchanged.
    fn align_up(self, alignment: Self::Alignment) -> Self;

    /// Round down to the previous multiple of `alignment`. An alignment of zero leaves the value unchanged.
    fn align_down(self, alignment: Self::Alignment) -> Self;

    fn is_aligned(self, alignment: Self::Alignment) -> bool;
}

macro_rules! impl_alignable {
    ($numtype:ty) => {
        impl Alignable for $numtype {
            type Alignment = $numtype;

            #[inline]
            fn align_up(self, alignment: $numtype) -> $numtype {
                match alignment {
                    0 => self,
                    _ => {
                        debug_assert!(alignment.is_power_of_two(), "alignment must be power of two");
                        let mask = alignment - 1;
                        (self + mask) & !mask
                    }
                }
            }

            #[inline]
            fn align_down(self, alignment: $numtype) -> $numtype {
                match alignment {
                    0 => self,
                    _ => {
                        debug_assert!(alignment.is_power_of_two(), "alignment must be power of two");
                        self & !(alignment - 1)
                    }
                }
            }

            #[inline]
            fn is_aligned(self, alignment: $numtype) -> bool {
                self.align_down(alignment) == self
            }
        }
    };
}

impl_alignable!(usize);
impl_alignable!(u64);
impl_alignable!(u32);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_boundaries() {
        assert_eq!(0x8000_usize.align_down(4096), 0x8000);
        assert_eq!(0x8fff_usize.align_down(4096), 0x8000);
        assert_eq!(0x8001_usize.align_up(4096), 0x9000);
        assert_eq!(0xe_0000_u64.align_up(16), 0xe_0000);
        assert_eq!(0x8_0007_u64.align_down(16), 0x8_0000);
    }

    #[test]
    fn zero_alignment_is_identity() {
        assert_eq!(23_usize.align_up(0), 23);
        assert_eq!(0xFFFF_FFFF_usize.align_down(0), 0xFFFF_FFFF);
        assert!(17_u32.is_aligned(0));
    }

    #[test]
    fn alignment_checks() {
        assert!(0xfee0_0000_u64.is_aligned(4096));
        assert!(!0xfee0_0010_u64.is_aligned(4096));
        assert!(0xfee0_0010_u64.is_aligned(16));
    }
}
