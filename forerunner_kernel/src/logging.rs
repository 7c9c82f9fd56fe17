//! `log` backend writing to the first serial port.

use core::fmt::Write;

use bare_metal::cpu::io::com::{SerialPort, COM1_ADDR};
use bare_metal::cpu::io::{CpuPorts, PortIo};
use log::{LevelFilter, Log, Metadata, Record};

use crate::config::LOG_LEVEL;

/// Formats records as `LEVEL message` lines on a serial port.
pub struct SerialLogger<P> {
    port: spin::Mutex<SerialPort<P>>,
    level: LevelFilter,
}

impl<P: PortIo> SerialLogger<P> {
    pub const fn new(port: SerialPort<P>, level: LevelFilter) -> Self {
        SerialLogger { port: spin::Mutex::new(port), level }
    }

    pub fn open(&self) {
        self.port.lock().open();
    }
}

impl<P: PortIo + Send> Log for SerialLogger<P> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut port = self.port.lock();
            let _ = writeln!(port, "{:<5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger<CpuPorts> = SerialLogger::new(unsafe { SerialPort::new(COM1_ADDR, CpuPorts) }, LOG_LEVEL);

/// Program COM1 and route the `log` macros to it. Only the first call has an effect.
pub fn init() {
    LOGGER.open();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LOG_LEVEL);
    }
}
