//! A bump frame allocator that is meant for the early system startup.
//! Frames allocated with it are never reused, so it should only be used
//! for data that has to live for the whole up time, such as page tables and AP stacks.

use crate::physical::PageFrame;
use super::PageFrameAllocator;

/// Hands out consecutive frames from a reserved pool, starting at its lowest frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BumpAllocator {
    /// Next frame to hand out.
    next: PageFrame,
    /// First frame past the pool, if the pool is bounded.
    end: Option<PageFrame>,
}

impl BumpAllocator {
    /// An allocator over `[first, end)`. Without an `end` the pool is treated as unbounded.
    pub const fn new(first: PageFrame, end: Option<PageFrame>) -> BumpAllocator {
        BumpAllocator {
            next: first,
            end: end,
        }
    }

    /// The frame the next successful allocation will return.
    pub fn peek(&self) -> PageFrame {
        self.next
    }

    /// Number of frames left, if the pool is bounded.
    pub fn remaining(&self) -> Option<usize> {
        self.end.map(|end| end.0.saturating_sub(self.next.0))
    }
}

impl PageFrameAllocator for BumpAllocator {
    fn alloc(&mut self) -> Option<PageFrame> {
        if let Some(end) = self.end {
            if self.next >= end {
                return None;
            }
        }
        let frame = self.next;
        self.next += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frames_strictly_increase() {
        let mut pfa = BumpAllocator::new(PageFrame(0x200), None);
        let frames: Vec<PageFrame> = (0..64).map(|_| pfa.alloc().unwrap()).collect();
        assert!(frames.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(frames[0], PageFrame(0x200));
        assert_eq!(pfa.peek(), PageFrame(0x240));
    }

    #[test]
    fn bounded_pool_runs_dry() {
        let mut pfa = BumpAllocator::new(PageFrame(10), Some(PageFrame(12)));
        assert_eq!(pfa.remaining(), Some(2));
        assert_eq!(pfa.alloc(), Some(PageFrame(10)));
        assert_eq!(pfa.alloc(), Some(PageFrame(11)));
        assert_eq!(pfa.alloc(), None);
        assert_eq!(pfa.alloc(), None);
        assert_eq!(pfa.remaining(), Some(0));
    }
}
