use core::arch::asm;

/// A segment selector
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct Selector(pub u16);

impl Selector {
    pub const NULL: Selector = Selector(0);
    /// The 64-bit kernel code segment set up by the loader's GDT.
    pub const KERNEL_CODE: Selector = Selector(0x08);

    /// Index of the descriptor in the GDT.
    pub fn index(&self) -> u16 {
        self.0 >> 3
    }
}

/// Privilege level
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct Ring(u8);

impl Ring {
    pub const RING0: Ring = Ring(0);
    pub const RING3: Ring = Ring(3);

    /// Create a new ring if the number is valid (i.e. in the range 0 (kernel mode) - 3 (user mode))
    pub fn new(ring: u8) -> Option<Ring> {
        if ring <= 3 {
            Some(Ring(ring))
        } else {
            None
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

/// Load the task register with a TSS selector.
#[inline]
pub unsafe fn load_task_register(selector: Selector) {
    asm!("ltr {0:x}", in(reg) selector.0, options(nostack, preserves_flags));
}

/// Load the `gs` segment register.
#[inline]
pub unsafe fn load_gs(selector: Selector) {
    asm!("mov gs, {0:x}", in(reg) selector.0, options(nostack, preserves_flags));
}

/// Exchange the current gs base with the kernel gs base MSR.
#[inline]
pub unsafe fn swapgs() {
    asm!("swapgs", options(nostack, preserves_flags));
}
