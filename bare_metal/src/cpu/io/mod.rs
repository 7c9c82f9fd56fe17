//! Provides primitive operations for working with the CPUs I/O ports

use core::arch::asm;
use core::ops;

pub mod com;

/// A CPU I/O port number.
#[derive(Debug, Eq, PartialEq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct PortNumber(pub u16);

impl ops::Add<u16> for PortNumber {
    type Output = PortNumber;

    fn add(self, offset: u16) -> PortNumber {
        PortNumber(self.0 + offset)
    }
}

#[inline]
pub unsafe fn outb(port: PortNumber, data: u8) {
    asm!("out dx, al", in("dx") port.0, in("al") data, options(nomem, nostack, preserves_flags));
}

#[inline]
pub unsafe fn inb(port: PortNumber) -> u8 {
    let data: u8;
    asm!("in al, dx", out("al") data, in("dx") port.0, options(nomem, nostack, preserves_flags));
    data
}

/// Byte-wide port access. Drivers for the legacy timer, interrupt controller and serial port go
/// through this trait so they can be exercised against a recording fake.
pub trait PortIo {
    unsafe fn read_u8(&mut self, port: PortNumber) -> u8;
    unsafe fn write_u8(&mut self, port: PortNumber, data: u8);
}

/// Direct access to the ports of the executing CPU.
#[derive(Debug, Default, Copy, Clone)]
pub struct CpuPorts;

impl PortIo for CpuPorts {
    #[inline]
    unsafe fn read_u8(&mut self, port: PortNumber) -> u8 {
        inb(port)
    }

    #[inline]
    unsafe fn write_u8(&mut self, port: PortNumber, data: u8) {
        outb(port, data)
    }
}

impl<'a, P: PortIo> PortIo for &'a mut P {
    unsafe fn read_u8(&mut self, port: PortNumber) -> u8 {
        (**self).read_u8(port)
    }

    unsafe fn write_u8(&mut self, port: PortNumber, data: u8) {
        (**self).write_u8(port, data)
    }
}
