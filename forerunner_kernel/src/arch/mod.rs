//! x86_64 specific parts of the CPU initialization.

pub mod gdt;
pub mod isr;
pub mod lapic;

use bare_metal::cpu::msr;
#[cfg(not(test))]
use bare_metal::segments;
#[cfg(not(test))]
use interrupts::idt::{self, Idt};

use crate::smp::CpuRecord;
#[cfg(not(test))]
use crate::smp::CpuRegistry;

/// Shared by all CPUs.
#[cfg(not(test))]
static IDT: spin::Mutex<Idt> = spin::Mutex::new(Idt::new());

/// The record of the executing CPU, found through the gs base.
pub fn current_cpu() -> Option<&'static CpuRecord> {
    let record = unsafe { msr::IA32_GS_BASE.read() } as *const CpuRecord;
    unsafe { record.as_ref() }
}

/// Set up interrupt handling and the per-CPU state of the BSP.
#[cfg(not(test))]
pub unsafe fn early_init(registry: &'static CpuRegistry) -> &'static CpuRecord {
    {
        let mut table = IDT.lock();
        isr::EntryStubs::linked().install(&mut table);
        idt::load_idt(&table);
    }
    let record = lapic::init_bsp(registry);
    load_cpu_state(record);
    record
}

/// Per-CPU setup of an AP, running on its own stack.
#[cfg(not(test))]
pub unsafe fn ap_init(registry: &'static CpuRegistry) -> &'static CpuRecord {
    idt::load_idt(&IDT.lock());
    let record = lapic::init_ap(registry);
    load_cpu_state(record);
    record
}

/// Load the TSS and make the record reachable through gs.
#[cfg(not(test))]
unsafe fn load_cpu_state(record: &'static CpuRecord) {
    let cpu = record.number();
    {
        let arch = record.arch.lock();
        gdt::install_tss(cpu, &arch.tss);
    }
    segments::load_task_register(gdt::tss_selector(cpu));

    segments::load_gs(gdt::gs_selector(cpu));
    msr::IA32_GS_BASE.write(0);
    msr::IA32_KERNEL_GS_BASE.write(record.self_pointer() as u64);
    segments::swapgs();
}
