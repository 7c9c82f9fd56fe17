//! Channel 2 of the 8254 programmable interval timer, used as a known time base while
//! calibrating the local APIC timer.

use bare_metal::cpu::io::{PortIo, PortNumber};
use bare_metal::wait::{self, Timeout};

const CHANNEL2_DATA: PortNumber = PortNumber(0x42);
const MODE_COMMAND: PortNumber = PortNumber(0x43);
/// Keyboard controller data port, read only to give the PIT time between the two count bytes.
const DELAY_PORT: PortNumber = PortNumber(0x60);
/// Port B of the system control logic: gate and output of channel 2, speaker enable.
const CONTROL_PORT_B: PortNumber = PortNumber(0x61);

const GATE2: u8 = 0x01;
const SPEAKER: u8 = 0x02;
const OUT2: u8 = 0x20;

/// Input clock of the PIT in Hz.
pub const PIT_FREQUENCY_HZ: u32 = 1_193_180;

/// Channel 2, lobyte/hibyte access, mode 1 (hardware re-triggerable one-shot), binary.
const ONE_SHOT_CHANNEL2: u8 = 0xb2;

/// Reload value for a one-shot lasting `1 / fraction` of a second.
pub fn reload_for(fraction: u32) -> u16 {
    (PIT_FREQUENCY_HZ / fraction) as u16
}

/// Program channel 2 for a one-shot of `count` PIT ticks and start it.
/// The speaker stays disconnected.
pub unsafe fn start_one_shot<P: PortIo>(ports: &mut P, count: u16) {
    let control = ports.read_u8(CONTROL_PORT_B);
    ports.write_u8(CONTROL_PORT_B, (control & !SPEAKER) | GATE2);
    ports.write_u8(MODE_COMMAND, ONE_SHOT_CHANNEL2);

    ports.write_u8(CHANNEL2_DATA, count as u8);
    ports.read_u8(DELAY_PORT);
    ports.write_u8(CHANNEL2_DATA, (count >> 8) as u8);

    // a rising edge on the gate restarts the count
    let control = ports.read_u8(CONTROL_PORT_B) & !GATE2;
    ports.write_u8(CONTROL_PORT_B, control);
    ports.write_u8(CONTROL_PORT_B, control | GATE2);
}

/// Whether the one-shot started by `start_one_shot` has run out.
pub unsafe fn expired<P: PortIo>(ports: &mut P) -> bool {
    ports.read_u8(CONTROL_PORT_B) & OUT2 != 0
}

/// Spin until the one-shot has run out, polling at most `limit` times.
pub unsafe fn wait_expired<P: PortIo>(ports: &mut P, limit: u64) -> Result<u64, Timeout> {
    wait::spin_until(limit, || expired(ports))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::vec::Vec;

    /// Port B reads report the output pin after a fixed number of polls.
    struct FakePit {
        port_b: u8,
        polls_until_out: usize,
        writes: Vec<(u16, u8)>,
    }

    impl PortIo for FakePit {
        unsafe fn read_u8(&mut self, port: PortNumber) -> u8 {
            match port.0 {
                0x61 => {
                    if self.polls_until_out == 0 {
                        self.port_b | OUT2
                    } else {
                        self.polls_until_out -= 1;
                        self.port_b
                    }
                }
                _ => 0,
            }
        }

        unsafe fn write_u8(&mut self, port: PortNumber, data: u8) {
            if port == CONTROL_PORT_B {
                self.port_b = data;
            }
            self.writes.push((port.0, data));
        }
    }

    #[test]
    fn twentieth_of_a_second() {
        assert_eq!(reload_for(20), 0xe90b);
    }

    #[test]
    fn one_shot_programming() {
        let mut pit = FakePit { port_b: 0x0e, polls_until_out: 100, writes: Vec::new() };
        unsafe { start_one_shot(&mut pit, 0xe90b) };
        assert_eq!(pit.writes, vec![
            (0x61, 0x0d),
            (0x43, 0xb2),
            (0x42, 0x0b),
            (0x42, 0xe9),
            (0x61, 0x0c),
            (0x61, 0x0d),
        ]);
    }

    #[test]
    fn bounded_wait() {
        let mut pit = FakePit { port_b: 0, polls_until_out: 3, writes: Vec::new() };
        assert_eq!(unsafe { wait_expired(&mut pit, 10) }, Ok(3));

        let mut pit = FakePit { port_b: 0, polls_until_out: 100, writes: Vec::new() };
        assert_eq!(unsafe { wait_expired(&mut pit, 10) }, Err(Timeout { spins: 10 }));
    }
}
