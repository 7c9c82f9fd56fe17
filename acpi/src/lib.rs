//! Discovery of the processor topology from the ACPI tables.
//!
//! Firmware memory is never dereferenced directly. Every access goes through a
//! `PhysicalMemory`, which decides how physical addresses become readable (the kernel maps
//! them on demand, the tests serve byte images).

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;
extern crate bare_metal;

pub mod util;
mod madt;
mod rsdp;
mod rsdt;
mod sdt;
mod signature;
mod walker;

pub use self::madt::*;
pub use self::rsdp::*;
pub use self::rsdt::*;
pub use self::sdt::*;
pub use self::signature::*;
pub use self::walker::*;

use bare_metal::PhysAddr;

/// Read access to physical memory holding firmware tables.
pub trait PhysicalMemory {
    /// The `len` bytes starting at `addr`, or `None` if they cannot be made readable.
    fn read(&self, addr: PhysAddr, len: usize) -> Option<&[u8]>;
}

impl<'a, M: PhysicalMemory + ?Sized> PhysicalMemory for &'a M {
    fn read(&self, addr: PhysAddr, len: usize) -> Option<&[u8]> {
        (**self).read(addr, len)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AcpiError {
    /// Neither the EBDA nor the BIOS area contain a valid root pointer.
    NoRsdp,
    /// Neither the XSDT nor the RSDT validate.
    NoRootTable,
    /// A table pointer was null.
    NullAddress,
    /// The memory behind the address cannot be read.
    Unreadable(PhysAddr),
    /// The table at the address carries a different signature.
    SignatureMismatch { addr: PhysAddr, expected: Signature, found: Signature },
    /// The declared length is too short to even hold the header.
    InvalidLength { addr: PhysAddr, length: u32 },
    /// The bytes of the table do not sum up to zero.
    ChecksumMismatch(PhysAddr),
}
