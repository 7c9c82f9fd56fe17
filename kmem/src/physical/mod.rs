use bare_metal::{Alignable, PhysAddr};
use core::ops;
use crate::{PAGE_SIZE, PAGE_ALIGN_BITS};

pub mod alloc;

/// Number of a physical page frame, counted from the start.
/// The first page frame at physical address 0x0 has number zero.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct PageFrame(pub usize);

impl PageFrame {
    /// Return the next page frame starting at or above the given physical address.
    pub fn next_above(addr: PhysAddr) -> PageFrame {
        PageFrame(addr.align_up(PAGE_SIZE).0 >> PAGE_ALIGN_BITS)
    }

    /// Return the page frame including the given physical address.
    pub fn including(addr: PhysAddr) -> PageFrame {
        PageFrame(addr.0 >> PAGE_ALIGN_BITS)
    }

    pub fn start_address(&self) -> PhysAddr {
        PhysAddr(self.0 << PAGE_ALIGN_BITS)
    }
}

impl ops::Add<usize> for PageFrame {
    type Output = PageFrame;

    fn add(self, rhs: usize) -> PageFrame {
        PageFrame(self.0 + rhs)
    }
}

impl ops::AddAssign<usize> for PageFrame {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frames_and_addresses() {
        assert_eq!(PageFrame::including(PhysAddr(0xfee0_0fff)), PageFrame(0xfee00));
        assert_eq!(PageFrame::next_above(PhysAddr(0x8001)), PageFrame(9));
        assert_eq!(PageFrame::next_above(PhysAddr(0x8000)), PageFrame(8));
        assert_eq!(PageFrame(0xe0).start_address(), PhysAddr(0xe_0000));
    }
}
