#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate static_assertions;
#[macro_use]
extern crate log;
extern crate bare_metal;

use core::arch::asm;

pub mod apic;
pub mod idt;
pub mod pic;
pub mod pit;

/// Enable interrupts on the current CPU.
#[inline]
pub unsafe fn enable() {
    asm!("sti", options(nomem, nostack));
}

/// Disable interrupts on the current CPU.
#[inline]
pub unsafe fn disable() {
    asm!("cli", options(nomem, nostack));
}
