//! Newtype wrappers that make it harder to accidentally confuse physical and virtual addresses.

use core::fmt;
use core::ops;

use super::align::Alignable;

/// Size of a normal page, 4096 bytes.
pub const PAGE_SIZE: usize = 4096;

/// A virtual address. It's validity depends on the current page mapping.
#[repr(C)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct VirtAddr(pub usize);

/// A physical address. Whether it is accessible depends on the current page mapping.
#[repr(C)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct PhysAddr(pub usize);

impl VirtAddr {
    pub const NULL: VirtAddr = VirtAddr(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// The same numeric address, for regions that are identity mapped.
    pub fn identity(phys: PhysAddr) -> VirtAddr {
        VirtAddr(phys.0)
    }
}

impl PhysAddr {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Number of the page frame containing this address.
    pub fn frame_number(self) -> usize {
        self.0 / PAGE_SIZE
    }

    pub fn page_base(self) -> PhysAddr {
        self.align_down(PAGE_SIZE)
    }
}

macro_rules! impl_addr_arith {
    ($addr:tt) => {
        impl Alignable for $addr {
            type Alignment = usize;

            fn align_up(self, alignment: usize) -> Self {
                $addr(self.0.align_up(alignment))
            }

            fn align_down(self, alignment: usize) -> Self {
                $addr(self.0.align_down(alignment))
            }

            fn is_aligned(self, alignment: usize) -> bool {
                self.0.is_aligned(alignment)
            }
        }

        impl ops::Add<usize> for $addr {
            type Output = $addr;

            fn add(self, other: usize) -> Self::Output {
                $addr(self.0 + other)
            }
        }

        impl ops::AddAssign<usize> for $addr {
            fn add_assign(&mut self, other: usize) {
                self.0 += other;
            }
        }

        impl ops::Sub<usize> for $addr {
            type Output = $addr;

            fn sub(self, other: usize) -> Self::Output {
                $addr(self.0 - other)
            }
        }

        impl ops::Sub<$addr> for $addr {
            type Output = usize;

            fn sub(self, other: $addr) -> usize {
                self.0 - other.0
            }
        }
    };
}

impl_addr_arith!(VirtAddr);
impl_addr_arith!(PhysAddr);

impl fmt::Pointer for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PHYS_0x{:016x}", self.0)
    }
}

impl fmt::Pointer for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VIRT_0x{:016x}", self.0)
    }
}
