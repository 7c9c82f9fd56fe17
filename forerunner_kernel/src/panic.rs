//! Fatal halt: report the panic on the serial port and stop the CPU.

use core::fmt::{self, Write};

use crate::smp::{CpuRecord, CpuStatus};

/// Write the panic message followed by the context of the panicking CPU.
pub fn write_report<W: Write>(out: &mut W, message: &dyn fmt::Display, cpu: Option<&CpuRecord>) -> fmt::Result {
    let (number, status) = match cpu {
        Some(cpu) => (cpu.number(), cpu.status()),
        None => (0, CpuStatus::None),
    };
    writeln!(out)?;
    writeln!(out, "-----[ KERNEL PANIC ]-----")?;
    writeln!(out, "{}", message)?;
    writeln!(out, "  The current cpu context is {} ({}) on CPU{}", status.name(), status as u32, number)
}

#[cfg(not(test))]
#[panic_handler]
fn panic(panic_info: &core::panic::PanicInfo) -> ! {
    use bare_metal::cpu;
    use bare_metal::cpu::io::com::{SerialPort, COM1_ADDR};
    use bare_metal::cpu::io::CpuPorts;

    unsafe { interrupts::disable() };
    // The logger may be locked by the code that panicked, so grab a fresh handle to the port.
    let mut com1 = unsafe { SerialPort::new(COM1_ADDR, CpuPorts) };
    let _ = write_report(&mut com1, panic_info, crate::arch::current_cpu());
    unsafe { cpu::hang() }
}
