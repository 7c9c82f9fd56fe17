//! Register offsets of the local APIC and which of them may be touched in each mode.

use bare_metal::cpu::msr::Msr;

/// Offset of a register in the xAPIC MMIO window.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Register(pub u32);

impl Register {
    pub const ID: Register = Register(0x20);
    pub const VERSION: Register = Register(0x30);
    pub const TASK_PRIORITY: Register = Register(0x80);
    pub const ARBITRATION_PRIORITY: Register = Register(0x90);
    pub const PROCESSOR_PRIORITY: Register = Register(0xa0);
    pub const EOI: Register = Register(0xb0);
    pub const REMOTE_READ: Register = Register(0xc0);
    pub const LOGICAL_DESTINATION: Register = Register(0xd0);
    pub const DESTINATION_FORMAT: Register = Register(0xe0);
    pub const SPURIOUS_INTERRUPT_VECTOR: Register = Register(0xf0);
    pub const IN_SERVICE: Register = Register(0x100);
    pub const TRIGGER_MODE: Register = Register(0x180);
    pub const INTERRUPT_REQUEST: Register = Register(0x200);
    pub const ERROR_STATUS: Register = Register(0x280);
    pub const LVT_CMCI: Register = Register(0x2f0);
    pub const ICR_LOW: Register = Register(0x300);
    pub const ICR_HIGH: Register = Register(0x310);
    pub const LVT_TIMER: Register = Register(0x320);
    pub const LVT_THERMAL: Register = Register(0x330);
    pub const LVT_PERF: Register = Register(0x340);
    pub const LVT_LINT0: Register = Register(0x350);
    pub const LVT_LINT1: Register = Register(0x360);
    pub const LVT_ERROR: Register = Register(0x370);
    pub const TIMER_INITIAL_COUNT: Register = Register(0x380);
    pub const TIMER_CURRENT_COUNT: Register = Register(0x390);
    pub const TIMER_DIVIDE_CONFIG: Register = Register(0x3e0);
    pub const SELF_IPI: Register = Register(0x3f0);

    /// The MSR that backs this register in x2APIC mode.
    pub fn msr(self) -> Msr {
        Msr(0x800 + (self.0 >> 4))
    }

    pub fn is_readable(self, x2apic: bool) -> bool {
        match self {
            Register::ID
            | Register::VERSION
            | Register::TASK_PRIORITY
            | Register::ARBITRATION_PRIORITY
            | Register::PROCESSOR_PRIORITY
            | Register::REMOTE_READ
            | Register::LOGICAL_DESTINATION
            | Register::DESTINATION_FORMAT
            | Register::SPURIOUS_INTERRUPT_VECTOR
            | Register::ERROR_STATUS
            | Register::LVT_CMCI
            | Register::ICR_LOW
            | Register::LVT_TIMER
            | Register::LVT_THERMAL
            | Register::LVT_PERF
            | Register::LVT_LINT0
            | Register::LVT_LINT1
            | Register::LVT_ERROR
            | Register::TIMER_INITIAL_COUNT
            | Register::TIMER_CURRENT_COUNT
            | Register::TIMER_DIVIDE_CONFIG => true,
            // the x2APIC ICR is a single 64 bit MSR
            Register::ICR_HIGH => !x2apic,
            _ => false,
        }
    }

    pub fn is_writable(self, x2apic: bool) -> bool {
        match self {
            Register::TASK_PRIORITY
            | Register::EOI
            | Register::SPURIOUS_INTERRUPT_VECTOR
            | Register::ERROR_STATUS
            | Register::LVT_CMCI
            | Register::ICR_LOW
            | Register::LVT_TIMER
            | Register::LVT_THERMAL
            | Register::LVT_PERF
            | Register::LVT_LINT0
            | Register::LVT_LINT1
            | Register::LVT_ERROR
            | Register::TIMER_INITIAL_COUNT
            | Register::TIMER_DIVIDE_CONFIG => true,
            // the logical destination is derived from the ID in x2APIC mode and has no DFR
            Register::ICR_HIGH | Register::LOGICAL_DESTINATION | Register::DESTINATION_FORMAT => !x2apic,
            Register::SELF_IPI => x2apic,
            _ => false,
        }
    }

    /// Base of one of the 256 bit vector registers (ISR, TMR, IRR).
    pub fn is_status(self) -> bool {
        match self {
            Register::IN_SERVICE | Register::TRIGGER_MODE | Register::INTERRUPT_REQUEST => true,
            _ => false,
        }
    }
}
