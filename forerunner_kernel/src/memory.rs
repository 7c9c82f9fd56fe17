//! The kernel's view of memory during boot: one frame pool and the current address space.

use core::slice;

use acpi::PhysicalMemory;
use bare_metal::{PhysAddr, VirtAddr};
use kmem::paging::{self, MapError, MapFlags, RecursiveMapping, TableAccessor};
use kmem::physical::alloc::{BumpAllocator, PageFrameAllocator};
use kmem::physical::PageFrame;

use crate::config::{PAGE_SIZE, RECURSIVE_INDEX};
use crate::smp::startup::StackMapper;

/// Frame pool and page tables, always used together.
pub struct MemoryContext<T, A> {
    tables: T,
    frames: A,
}

impl<T, A> MemoryContext<T, A> {
    pub const fn new(tables: T, frames: A) -> Self {
        MemoryContext { tables, frames }
    }

    pub fn frames_mut(&mut self) -> &mut A {
        &mut self.frames
    }

    pub fn tables_mut(&mut self) -> &mut T {
        &mut self.tables
    }
}

impl<T: TableAccessor, A: PageFrameAllocator> MemoryContext<T, A> {
    pub unsafe fn map(&mut self, vaddr: VirtAddr, frame: PageFrame, flags: MapFlags) -> Result<(), MapError> {
        paging::map_page(&mut self.tables, &mut self.frames, vaddr, frame, flags)
    }

    /// Back `vaddr` with a newly allocated frame.
    pub unsafe fn map_fresh(&mut self, vaddr: VirtAddr, flags: MapFlags) -> Result<PageFrame, MapError> {
        let frame = self.frames.alloc().ok_or(MapError::OutOfMemory)?;
        self.map(vaddr, frame, flags)?;
        Ok(frame)
    }

    /// Identity map every page touching `[addr, addr + len)` that is not mapped yet.
    /// Pages that are already mapped keep their mapping. Fails before mapping anything if the
    /// range wraps around the address space.
    pub unsafe fn identity_map(&mut self, addr: PhysAddr, len: usize, flags: MapFlags) -> Result<(), MapError> {
        let mut page = addr.page_base();
        let end = addr.0.checked_add(len)
            .and_then(|end| end.checked_add(PAGE_SIZE - 1))
            .map(|end| PhysAddr(end).page_base())
            .ok_or(MapError::AddressOverflow)?;
        while page < end {
            let vaddr = VirtAddr::identity(page);
            if paging::resolve(&mut self.tables, vaddr).is_none() {
                self.map(vaddr, PageFrame::including(page), flags)?;
            }
            page = page + PAGE_SIZE;
        }
        Ok(())
    }
}

impl<T: TableAccessor, A: PageFrameAllocator> StackMapper for MemoryContext<T, A> {
    unsafe fn map_stack(&mut self, top: VirtAddr, size: usize) -> Result<(), MapError> {
        let mut page = top - size;
        while page < top {
            self.map_fresh(page, MapFlags::WRITABLE | MapFlags::KERNEL)?;
            page = page + PAGE_SIZE;
        }
        Ok(())
    }
}

/// Physical memory read through identity mappings that are created on first access.
pub struct IdentityWindow<'a, T, A> {
    memory: &'a spin::Mutex<MemoryContext<T, A>>,
}

impl<'a, T, A> IdentityWindow<'a, T, A> {
    pub fn new(memory: &'a spin::Mutex<MemoryContext<T, A>>) -> Self {
        IdentityWindow { memory }
    }
}

impl<'a, T: TableAccessor, A: PageFrameAllocator> PhysicalMemory for IdentityWindow<'a, T, A> {
    fn read(&self, addr: PhysAddr, len: usize) -> Option<&[u8]> {
        if addr.is_null() {
            return None;
        }
        let mapped = unsafe { self.memory.lock().identity_map(addr, len, MapFlags::KERNEL) };
        if let Err(err) = mapped {
            warn!("[VMM] cannot map firmware memory at {:p}: {:?}", addr, err);
            return None;
        }
        Some(unsafe { slice::from_raw_parts(VirtAddr::identity(addr).as_ptr::<u8>(), len) })
    }
}

pub type KernelMemory = MemoryContext<RecursiveMapping, BumpAllocator>;

const RECURSIVE: RecursiveMapping = match RecursiveMapping::new(RECURSIVE_INDEX) {
    Some(mapping) => mapping,
    None => panic!("recursive index outside the PML4"),
};

/// The memory of the running kernel. The frame pool is empty until `init` runs.
pub static KERNEL_MEMORY: spin::Mutex<KernelMemory> =
    spin::Mutex::new(MemoryContext::new(RECURSIVE, BumpAllocator::new(PageFrame(0), Some(PageFrame(0)))));

/// Hand every frame from `first_free` upwards to the kernel.
pub fn init(first_free: PageFrame) {
    debug!("[VMM] frame pool starts at {:p}", first_free.start_address());
    *KERNEL_MEMORY.lock().frames_mut() = BumpAllocator::new(first_free, None);
}

/// Map a page of the kernel address space. Failing to do so is fatal.
pub fn map(vaddr: VirtAddr, frame: PageFrame, flags: MapFlags) {
    if let Err(err) = unsafe { KERNEL_MEMORY.lock().map(vaddr, frame, flags) } {
        panic!("[VMM] cannot map {:p}: {:?}", vaddr, err);
    }
}
