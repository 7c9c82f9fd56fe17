use crate::physical::PageFrame;

pub mod bump;

pub use self::bump::BumpAllocator;

/// Generic interface for a page frame allocator.
pub trait PageFrameAllocator {
    /// Allocate a single page frame, or `None` once the backing pool is used up.
    fn alloc(&mut self) -> Option<PageFrame>;
}

impl<'a, A: PageFrameAllocator + ?Sized> PageFrameAllocator for &'a mut A {
    fn alloc(&mut self) -> Option<PageFrame> {
        (**self).alloc()
    }
}
