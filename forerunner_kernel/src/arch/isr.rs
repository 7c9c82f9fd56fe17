//! Interrupt entry stubs and the common dispatcher behind them.
//!
//! Every stub pushes an error code (0 if the CPU does not supply one) and its vector number,
//! saves the scratch registers and calls `isr_dispatch(vector, error_code)`.

use core::sync::atomic::{AtomicU64, Ordering};

use interrupts::idt::{Idt, EXCEPTION_COUNT};

use crate::config::{KERNEL_CODE_SELECTOR, SPURIOUS_VECTOR, TIMER_VECTOR};
use crate::smp::CpuStatus;

/// Vector reported by the stub shared by all unassigned vectors.
pub const UNASSIGNED_VECTOR: u64 = u64::MAX;

pub static EXCEPTION_NAMES: [&str; EXCEPTION_COUNT] = [
    "Divide Error",
    "Debug",
    "Non-Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "Bound Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved (15)",
    "x87 Floating-Point Exception",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
    "Virtualization Exception",
    "Control Protection Exception",
    "Reserved (22)",
    "Reserved (23)",
    "Reserved (24)",
    "Reserved (25)",
    "Reserved (26)",
    "Reserved (27)",
    "Hypervisor Injection Exception",
    "VMM Communication Exception",
    "Security Exception",
    "Reserved (31)",
];

/// Timer interrupts seen by all CPUs together.
pub static TICKS: AtomicU64 = AtomicU64::new(0);

/// Interrupts on vectors nobody asked for, and the last such vector. Interrupt context may not
/// take the logger lock, so these are only counted here.
pub static UNEXPECTED: AtomicU64 = AtomicU64::new(0);
pub static LAST_UNEXPECTED: AtomicU64 = AtomicU64::new(UNASSIGNED_VECTOR);

// the stubs below push these vectors as literals
const_assert_eq!(timer_stub_vector; TIMER_VECTOR, 32);
const_assert_eq!(spurious_stub_vector; SPURIOUS_VECTOR, 39);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InterruptKind {
    Exception(&'static str),
    Timer,
    Spurious,
    Unexpected,
}

pub fn classify(vector: u64) -> InterruptKind {
    match vector {
        v if v < EXCEPTION_COUNT as u64 => InterruptKind::Exception(EXCEPTION_NAMES[v as usize]),
        v if v == TIMER_VECTOR as u64 => InterruptKind::Timer,
        v if v == SPURIOUS_VECTOR as u64 => InterruptKind::Spurious,
        _ => InterruptKind::Unexpected,
    }
}

#[no_mangle]
pub extern "C" fn isr_dispatch(vector: u64, error_code: u64) {
    dispatch(vector, error_code, || unsafe { super::lapic::local_apic().eoi() });
}

fn dispatch<F: FnOnce()>(vector: u64, error_code: u64, eoi: F) {
    match classify(vector) {
        InterruptKind::Exception(name) => {
            if let Some(cpu) = super::current_cpu() {
                cpu.set_status(CpuStatus::Exception);
            }
            panic!("{} (vector {}, error code {:#x})", name, vector, error_code);
        }
        InterruptKind::Timer => {
            TICKS.fetch_add(1, Ordering::Relaxed);
            eoi();
        }
        // never acknowledged, the APIC did not set an in-service bit for it
        InterruptKind::Spurious => {}
        InterruptKind::Unexpected => {
            UNEXPECTED.fetch_add(1, Ordering::Relaxed);
            LAST_UNEXPECTED.store(vector, Ordering::Relaxed);
            eoi();
        }
    }
}

/// Addresses of the entry stubs.
#[derive(Debug, Copy, Clone)]
pub struct EntryStubs {
    pub exceptions: &'static [usize; EXCEPTION_COUNT],
    pub timer: usize,
    pub spurious: usize,
    pub catch_all: usize,
}

impl EntryStubs {
    /// Fill every vector of `idt` with the stub that reports it.
    pub fn install(&self, idt: &mut Idt) {
        let dedicated = [(TIMER_VECTOR, self.timer), (SPURIOUS_VECTOR, self.spurious)];
        idt.populate(KERNEL_CODE_SELECTOR, self.exceptions, &dedicated, self.catch_all);
    }

    /// The stubs as placed by the linker.
    #[cfg(not(test))]
    pub fn linked() -> EntryStubs {
        extern "C" {
            static isr_exception_stubs: [usize; EXCEPTION_COUNT];
            fn isr_timer();
            fn isr_spurious();
            fn isr_catch_all();
        }
        unsafe {
            EntryStubs {
                exceptions: &isr_exception_stubs,
                timer: isr_timer as usize,
                spurious: isr_spurious as usize,
                catch_all: isr_catch_all as usize,
            }
        }
    }
}

#[cfg(not(test))]
core::arch::global_asm!(r#"
.macro ISR_NOERR n
.global isr_\n
isr_\n:
    push 0
    push \n
    jmp isr_common
.endm

.macro ISR_ERR n
.global isr_\n
isr_\n:
    push \n
    jmp isr_common
.endm

.section .text
ISR_NOERR 0
ISR_NOERR 1
ISR_NOERR 2
ISR_NOERR 3
ISR_NOERR 4
ISR_NOERR 5
ISR_NOERR 6
ISR_NOERR 7
ISR_ERR   8
ISR_NOERR 9
ISR_ERR   10
ISR_ERR   11
ISR_ERR   12
ISR_ERR   13
ISR_ERR   14
ISR_NOERR 15
ISR_NOERR 16
ISR_ERR   17
ISR_NOERR 18
ISR_NOERR 19
ISR_NOERR 20
ISR_ERR   21
ISR_NOERR 22
ISR_NOERR 23
ISR_NOERR 24
ISR_NOERR 25
ISR_NOERR 26
ISR_NOERR 27
ISR_NOERR 28
ISR_ERR   29
ISR_ERR   30
ISR_NOERR 31

.global isr_timer
isr_timer:
    push 0
    push 32
    jmp isr_common

.global isr_spurious
isr_spurious:
    push 0
    push 39
    jmp isr_common

.global isr_catch_all
isr_catch_all:
    push 0
    push -1
    jmp isr_common

isr_common:
    push rax
    push rcx
    push rdx
    push rsi
    push rdi
    push r8
    push r9
    push r10
    push r11
    mov rdi, [rsp + 72]
    mov rsi, [rsp + 80]
    cld
    call isr_dispatch
    pop r11
    pop r10
    pop r9
    pop r8
    pop rdi
    pop rsi
    pop rdx
    pop rcx
    pop rax
    add rsp, 16
    iretq

.section .rodata
.balign 8
.global isr_exception_stubs
isr_exception_stubs:
    .quad isr_0, isr_1, isr_2, isr_3, isr_4, isr_5, isr_6, isr_7
    .quad isr_8, isr_9, isr_10, isr_11, isr_12, isr_13, isr_14, isr_15
    .quad isr_16, isr_17, isr_18, isr_19, isr_20, isr_21, isr_22, isr_23
    .quad isr_24, isr_25, isr_26, isr_27, isr_28, isr_29, isr_30, isr_31
.section .text
"#);

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::Cell;

    static EXCEPTION_STUBS: [usize; EXCEPTION_COUNT] = {
        let mut stubs = [0; EXCEPTION_COUNT];
        let mut i = 0;
        while i < EXCEPTION_COUNT {
            stubs[i] = 0x10_0000 + 0x10 * i;
            i += 1;
        }
        stubs
    };

    fn stubs() -> EntryStubs {
        EntryStubs { exceptions: &EXCEPTION_STUBS, timer: 0x20_0000, spurious: 0x20_0040, catch_all: 0x30_0000 }
    }

    #[test]
    fn vector_classes() {
        assert_eq!(classify(14), InterruptKind::Exception("Page Fault"));
        assert_eq!(classify(8), InterruptKind::Exception("Double Fault"));
        assert_eq!(classify(32), InterruptKind::Timer);
        assert_eq!(classify(39), InterruptKind::Spurious);
        assert_eq!(classify(0x40), InterruptKind::Unexpected);
        assert_eq!(classify(UNASSIGNED_VECTOR), InterruptKind::Unexpected);
    }

    #[test]
    fn spurious_vector_has_its_own_stub() {
        let mut idt = Box::new(Idt::new());
        stubs().install(&mut idt);

        assert!(idt.is_complete());
        assert_eq!(idt[14].handler_address(), 0x10_00e0);
        assert_eq!(idt[TIMER_VECTOR].handler_address(), 0x20_0000);
        assert_eq!(idt[SPURIOUS_VECTOR].handler_address(), 0x20_0040);
        assert_eq!(idt[SPURIOUS_VECTOR + 1].handler_address(), 0x30_0000);
        assert_eq!(idt[0xff].handler_address(), 0x30_0000);
    }

    #[test]
    fn spurious_interrupts_are_not_acknowledged() {
        let eois = Cell::new(0);
        dispatch(SPURIOUS_VECTOR as u64, 0, || eois.set(eois.get() + 1));
        assert_eq!(eois.get(), 0);

        dispatch(TIMER_VECTOR as u64, 0, || eois.set(eois.get() + 1));
        assert_eq!(eois.get(), 1);
    }

    #[test]
    fn unexpected_interrupts_are_counted_and_acknowledged() {
        let eois = Cell::new(0);
        let before = UNEXPECTED.load(Ordering::Relaxed);
        dispatch(0x41, 0, || eois.set(eois.get() + 1));

        assert_eq!(eois.get(), 1);
        assert!(UNEXPECTED.load(Ordering::Relaxed) > before);
        assert_eq!(LAST_UNEXPECTED.load(Ordering::Relaxed), 0x41);
    }
}
