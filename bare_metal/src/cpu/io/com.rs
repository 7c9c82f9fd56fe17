//! Provides an interface to the serial COM ports.

use core::fmt;

use super::{PortIo, PortNumber};

/// The usual address of the COM1 port.
pub const COM1_ADDR: PortNumber = PortNumber(0x3F8);

const DATA: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

/// Line status bit: transmit holding register empty.
const LSR_THR_EMPTY: u8 = 0x20;

/// A 16550 compatible serial port identified by its base port number.
#[derive(Debug, Eq, PartialEq)]
pub struct SerialPort<P> {
    base: PortNumber,
    ports: P,
}

impl<P: PortIo> SerialPort<P> {
    /// Creates a new handle to a serial port.
    ///
    /// The caller must make sure that the port number refers to a COM port and that no other
    /// handle to the same port is used concurrently.
    pub const unsafe fn new(base: PortNumber, ports: P) -> SerialPort<P> {
        SerialPort { base, ports }
    }

    /// Program the port for 115200 baud, 8 data bits, no parity, one stop bit.
    pub fn open(&mut self) {
        unsafe {
            self.ports.write_u8(self.base + INTERRUPT_ENABLE, 0x00);
            // divisor latch access
            self.ports.write_u8(self.base + LINE_CONTROL, 0x80);
            self.ports.write_u8(self.base + DATA, 0x01);
            self.ports.write_u8(self.base + INTERRUPT_ENABLE, 0x00);
            self.ports.write_u8(self.base + LINE_CONTROL, 0x03);
            // enable and clear FIFOs, 14 byte threshold
            self.ports.write_u8(self.base + FIFO_CONTROL, 0xC7);
            self.ports.write_u8(self.base + MODEM_CONTROL, 0x0B);
        }
    }

    /// Send one byte, translating `\n` into `\r\n`.
    pub fn write_byte(&mut self, data: u8) {
        if data == b'\n' {
            self.transmit(b'\r');
        }
        self.transmit(data);
    }

    pub fn write(&mut self, data: &[u8]) {
        for byte in data {
            self.write_byte(*byte);
        }
    }

    fn transmit(&mut self, data: u8) {
        unsafe {
            while self.ports.read_u8(self.base + LINE_STATUS) & LSR_THR_EMPTY == 0 {
                core::hint::spin_loop();
            }
            self.ports.write_u8(self.base + DATA, data);
        }
    }
}

impl<P: PortIo> fmt::Write for SerialPort<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::fmt::Write;

    /// Records writes; the line status register reports "busy" for the first `busy_polls` reads.
    struct FakeUart {
        writes: Vec<(u16, u8)>,
        busy_polls: usize,
    }

    impl PortIo for FakeUart {
        unsafe fn read_u8(&mut self, port: PortNumber) -> u8 {
            assert_eq!(port, COM1_ADDR + LINE_STATUS);
            if self.busy_polls > 0 {
                self.busy_polls -= 1;
                0
            } else {
                LSR_THR_EMPTY
            }
        }

        unsafe fn write_u8(&mut self, port: PortNumber, data: u8) {
            self.writes.push((port.0, data));
        }
    }

    #[test]
    fn open_programs_115200_8n1() {
        let mut uart = FakeUart { writes: Vec::new(), busy_polls: 0 };
        let mut com1 = unsafe { SerialPort::new(COM1_ADDR, &mut uart) };
        com1.open();
        assert_eq!(uart.writes, vec![
            (0x3f9, 0x00), (0x3fb, 0x80), (0x3f8, 0x01), (0x3f9, 0x00),
            (0x3fb, 0x03), (0x3fa, 0xc7), (0x3fc, 0x0b),
        ]);
    }

    #[test]
    fn newline_becomes_crlf() {
        let mut uart = FakeUart { writes: Vec::new(), busy_polls: 3 };
        {
            let mut com1 = unsafe { SerialPort::new(COM1_ADDR, &mut uart) };
            write!(com1, "ok\n").unwrap();
        }
        let sent: Vec<u8> = uart.writes.iter().map(|w| w.1).collect();
        assert_eq!(sent, b"ok\r\n".to_vec());
        assert_eq!(uart.busy_polls, 0);
    }
}
