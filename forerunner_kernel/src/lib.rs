//! The early boot layer of the kernel: from the loader handing over on the BSP to every
//! CPU being initialized and the APs waiting to be released.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

extern crate acpi;
extern crate bare_metal;
extern crate interrupts;
extern crate kmem;

pub mod arch;
pub mod config;
pub mod logging;
pub mod memory;
pub mod panic;
pub mod platform;
pub mod smp;

use smp::CpuRegistry;

/// Records of all CPUs, indexed by local APIC ID.
pub static CPUS: CpuRegistry = CpuRegistry::new();

#[cfg(not(test))]
mod boot {
    use core::hint;

    use bare_metal::{cpu, VirtAddr};
    use kmem::paging::MapFlags;
    use kmem::physical::PageFrame;

    use super::CPUS;
    use crate::config::{AP_STARTUP_SPIN_LIMIT, TRAMPOLINE_ADDR};
    use crate::smp::startup::{self, StartupPlan};
    use crate::smp::trampoline::{self, TrampolinePage};
    use crate::smp::CpuStatus;
    use crate::{arch, logging, memory, platform};

    extern "C" {
        /// First frame not used by the loaded kernel image, provided by the loader.
        static early_frame: usize;
    }

    /// Entry point of the BSP. The loader calls it in long mode with the kernel mapped at its
    /// final address and a recursive PML4 entry in place.
    #[no_mangle]
    pub extern "C" fn kinit() -> ! {
        logging::init();
        CPUS.bp_init();
        memory::init(PageFrame(unsafe { early_frame }));
        unsafe { arch::early_init(&CPUS) };

        info!("Hello, World!");

        let firmware = memory::IdentityWindow::new(&memory::KERNEL_MEMORY);
        platform::discover(&CPUS, &firmware);

        start_aps();

        unsafe {
            interrupts::enable();
            cpu::hang()
        }
    }

    fn start_aps() {
        if CPUS.count() <= 1 {
            return;
        }
        let window = VirtAddr::identity(TRAMPOLINE_ADDR);
        memory::map(window, PageFrame::including(TRAMPOLINE_ADDR), MapFlags::WRITABLE | MapFlags::KERNEL);
        let tramp = match unsafe { TrampolinePage::install(trampoline::linked_code(), window) } {
            Ok(tramp) => tramp,
            Err(err) => panic!("[SMP] cannot install the AP startup code: {:?}", err),
        };

        let plan = StartupPlan {
            pml4: cpu::read_cr3(),
            entry_point: kinit_ap as usize,
            trampoline: TRAMPOLINE_ADDR,
            spin_limit: AP_STARTUP_SPIN_LIMIT,
        };
        let mut apic = *arch::lapic::local_apic();
        let mut kernel_memory = memory::KERNEL_MEMORY.lock();
        match unsafe { startup::start_secondaries(&CPUS, &tramp, &plan, &mut apic, &mut *kernel_memory) } {
            Ok(started) => info!("[SMP] {} of {} APs are fenced", started, CPUS.count() - 1),
            Err(err) => panic!("[SMP] cannot start the APs: {:?}", err),
        }
    }

    /// Entry point of the APs, reached through the trampoline on the AP's own stack.
    #[no_mangle]
    pub extern "C" fn kinit_ap() -> ! {
        let record = unsafe { arch::ap_init(&CPUS) };
        info!("Hello from CPU{}", record.number());
        record.set_status(CpuStatus::Fenced);

        unsafe { interrupts::enable() };
        // held here until the scheduler releases this CPU
        while record.status() == CpuStatus::Fenced {
            hint::spin_loop();
        }
        unsafe { cpu::hang() }
    }
}
