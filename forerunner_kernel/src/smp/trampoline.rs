//! The real mode startup code for the APs.
//!
//! The code itself is assembled and linked separately; it is bracketed by `_smp_start` and
//! `_smp_end` and begins with the parameter block below. The BSP copies it to a fixed page in
//! low memory once and patches the parameters before starting each AP.

use core::mem;
use core::ptr::{self, NonNull};
use core::sync::atomic::{self, Ordering};

use bare_metal::VirtAddr;

use super::startup::StartupError;
use crate::config::PAGE_SIZE;

/// Parameter block at the start of the startup code.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(C, packed)]
pub struct Trampoline {
    /// Jump over the parameter block.
    pub jump_code: u64,
    /// Serializes the APs inside the startup code.
    pub ap_lock: u32,
    /// Physical address of the PML4. The code loads it while still in 32-bit mode.
    pub pml4: u32,
    pub stack: u64,
    pub entry_point: u64,
}

assert_eq_size!(trampoline_size; Trampoline, [u8; 32]);

/// What an AP needs to find its way into the kernel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ApParameters {
    pub pml4: u64,
    pub stack_top: VirtAddr,
    pub entry_point: usize,
}

/// The startup code installed in low memory.
///
/// The parameter block is shared with the AP executing the code, so it is only ever accessed
/// through this handle and never through a Rust reference.
#[derive(Debug, Clone)]
pub struct TrampolinePage {
    block: NonNull<Trampoline>,
}

impl TrampolinePage {
    /// Copy the startup code to `target`.
    ///
    /// `target` must be a mapped and writable page, and no AP may be executing from it.
    pub unsafe fn install(code: &[u8], target: VirtAddr) -> Result<TrampolinePage, StartupError> {
        if code.len() < mem::size_of::<Trampoline>() || code.len() > PAGE_SIZE {
            return Err(StartupError::TrampolineSize(code.len()));
        }
        ptr::copy_nonoverlapping(code.as_ptr(), target.as_mut_ptr::<u8>(), code.len());
        Ok(TrampolinePage::at(target))
    }

    /// Use the startup code already present at `target`.
    pub unsafe fn at(target: VirtAddr) -> TrampolinePage {
        TrampolinePage { block: NonNull::new_unchecked(target.as_mut_ptr::<Trampoline>()) }
    }

    /// Reset the lock and fill in the parameters for the next AP.
    ///
    /// All stores are complete and visible before this returns, so the caller may send the
    /// startup IPI right away.
    pub fn patch(&self, params: &ApParameters) -> Result<(), StartupError> {
        if params.pml4 >> 32 != 0 {
            return Err(StartupError::Pml4AboveFourGiB(params.pml4));
        }
        let block = self.block.as_ptr();
        unsafe {
            ptr::write_unaligned(ptr::addr_of_mut!((*block).ap_lock), 0);
            ptr::write_unaligned(ptr::addr_of_mut!((*block).pml4), params.pml4 as u32);
            ptr::write_unaligned(ptr::addr_of_mut!((*block).stack), params.stack_top.0 as u64);
            ptr::write_unaligned(ptr::addr_of_mut!((*block).entry_point), params.entry_point as u64);
        }
        atomic::fence(Ordering::SeqCst);
        Ok(())
    }

    /// A copy of the parameter block as it is now.
    pub fn read(&self) -> Trampoline {
        unsafe { ptr::read_unaligned(self.block.as_ptr()) }
    }
}

/// The startup code as placed by the linker.
#[cfg(not(test))]
pub fn linked_code() -> &'static [u8] {
    extern "C" {
        static _smp_start: u8;
        static _smp_end: u8;
    }
    unsafe {
        let start = &_smp_start as *const u8;
        let end = &_smp_end as *const u8;
        core::slice::from_raw_parts(start, end as usize - start as usize)
    }
}
