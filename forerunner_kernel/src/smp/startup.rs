//! Bringing up the application processors, one at a time.

use bare_metal::wait;
use bare_metal::{PhysAddr, VirtAddr};
use interrupts::apic::{ApicIo, LocalApic};
use kmem::paging::MapError;

use super::trampoline::{ApParameters, TrampolinePage};
use super::{CpuRegistry, CpuStatus};
use crate::config;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StartupError {
    /// The PML4 does not fit into the 32-bit field of the trampoline.
    Pml4AboveFourGiB(u64),
    /// The stack of an AP could not be mapped.
    Stack(MapError),
    /// The startup code is shorter than its parameter block or does not fit into one page.
    TrampolineSize(usize),
}

impl From<MapError> for StartupError {
    fn from(err: MapError) -> StartupError {
        StartupError::Stack(err)
    }
}

/// Sends the INIT/SIPI sequence to another core.
pub trait StartupIpi {
    unsafe fn send_init(&mut self, core: u32);
    /// Start `core` in real mode at the page `start`.
    unsafe fn send_startup(&mut self, core: u32, start: PhysAddr);
}

impl<IO: ApicIo> StartupIpi for LocalApic<IO> {
    unsafe fn send_init(&mut self, core: u32) {
        LocalApic::send_init(self, core)
    }

    unsafe fn send_startup(&mut self, core: u32, start: PhysAddr) {
        LocalApic::send_startup(self, core, start)
    }
}

/// Backs the stack of an AP with memory.
pub trait StackMapper {
    /// Map `[top - size, top)` to freshly allocated frames.
    unsafe fn map_stack(&mut self, top: VirtAddr, size: usize) -> Result<(), MapError>;
}

/// The parts of the AP startup that are the same for every core.
#[derive(Debug, Copy, Clone)]
pub struct StartupPlan {
    /// Physical address of the PML4 the APs switch to.
    pub pml4: u64,
    /// Where the APs enter the kernel, see `kinit_ap`.
    pub entry_point: usize,
    /// Physical address of the installed trampoline.
    pub trampoline: PhysAddr,
    /// How long to wait for each AP to leave `Starting`.
    pub spin_limit: u64,
}

/// Start every discovered core except the BSP and return how many of them reported back.
///
/// The cores are started strictly one after another because they share the trampoline. A core
/// that does not leave `Starting` in time is marked `Off` and skipped.
pub unsafe fn start_secondaries<I, M>(
    registry: &CpuRegistry, trampoline: &TrampolinePage, plan: &StartupPlan, ipi: &mut I, stacks: &mut M,
) -> Result<usize, StartupError>
where
    I: StartupIpi + ?Sized,
    M: StackMapper + ?Sized,
{
    let count = registry.count();
    if count <= 1 {
        return Ok(0);
    }

    let mut started = 0;
    for (index, record) in registry.records().iter().enumerate().take(count) {
        if record.is_bsp() {
            continue;
        }
        record.set_status(CpuStatus::Starting);

        let stack_top = config::ap_stack_top(index);
        let params = ApParameters { pml4: plan.pml4, stack_top, entry_point: plan.entry_point };
        let prepared = trampoline.patch(&params)
            .and_then(|()| stacks.map_stack(stack_top, config::AP_STACK_SIZE).map_err(StartupError::from));
        if let Err(err) = prepared {
            record.set_status(CpuStatus::Off);
            return Err(err);
        }

        // the parameters are in place, see `TrampolinePage::patch`
        debug!("[SMP] starting CPU{} with stack at {:p}", index, stack_top);
        ipi.send_init(index as u32);
        ipi.send_startup(index as u32, plan.trampoline);

        match wait::spin_until(plan.spin_limit, || record.status() != CpuStatus::Starting) {
            Ok(_) => started += 1,
            Err(timeout) => {
                error!("[SMP] CPU{} did not respond after {} polls, leaving it off", index, timeout.spins);
                record.set_status(CpuStatus::Off);
            }
        }
    }
    Ok(started)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::smp::trampoline::Trampoline;
    use crate::config::{ap_stack_top, AP_STACK_SIZE, MAX_CPU, TRAMPOLINE_ADDR};
    use std::vec::Vec;

    #[derive(Debug, Eq, PartialEq)]
    enum Ipi {
        Init(u32),
        Startup(u32, PhysAddr),
    }

    /// Cores respond to the startup IPI by fencing themselves, unless they are listed as dead.
    /// Each core notes the stack it finds in the trampoline when it is started.
    struct FakeCores<'r> {
        registry: &'r CpuRegistry,
        trampoline: TrampolinePage,
        dead: Vec<u32>,
        sent: Vec<Ipi>,
        stacks_seen: Vec<u64>,
    }

    impl<'r> FakeCores<'r> {
        fn new(registry: &'r CpuRegistry, trampoline: &TrampolinePage, dead: Vec<u32>) -> Self {
            FakeCores { registry, trampoline: trampoline.clone(), dead, sent: vec![], stacks_seen: vec![] }
        }
    }

    impl<'r> StartupIpi for FakeCores<'r> {
        unsafe fn send_init(&mut self, core: u32) {
            self.sent.push(Ipi::Init(core));
        }

        unsafe fn send_startup(&mut self, core: u32, start: PhysAddr) {
            self.sent.push(Ipi::Startup(core, start));
            let stack = self.trampoline.read().stack;
            self.stacks_seen.push(stack);
            let record = self.registry.by_apic_id(core).unwrap();
            assert_eq!(record.status(), CpuStatus::Starting);
            if !self.dead.contains(&core) {
                record.set_status(CpuStatus::Fenced);
            }
        }
    }

    #[derive(Default)]
    struct FakeStacks {
        mapped: Vec<(VirtAddr, usize)>,
        fail: bool,
    }

    impl StackMapper for FakeStacks {
        unsafe fn map_stack(&mut self, top: VirtAddr, size: usize) -> Result<(), MapError> {
            if self.fail {
                return Err(MapError::OutOfMemory);
            }
            self.mapped.push((top, size));
            Ok(())
        }
    }

    fn registry(count: usize, bsp: u32) -> CpuRegistry {
        let registry = CpuRegistry::new();
        registry.bp_init();
        registry.claim_bsp(bsp).unwrap();
        registry.set_count(count);
        registry
    }

    fn plan(pml4: u64) -> StartupPlan {
        StartupPlan { pml4, entry_point: 0xffff_8000_0000_4000, trampoline: TRAMPOLINE_ADDR, spin_limit: 1000 }
    }

    /// A parameter block in host memory. It is leaked so the handle stays valid.
    fn empty_trampoline() -> TrampolinePage {
        let block = Box::new(Trampoline { jump_code: 0, ap_lock: 1, pml4: 0, stack: 0, entry_point: 0 });
        unsafe { TrampolinePage::at(VirtAddr(Box::into_raw(block) as usize)) }
    }

    #[test]
    fn single_cpu_is_a_noop() {
        let registry = registry(1, 0);
        let tramp = empty_trampoline();
        let mut cores = FakeCores::new(&registry, &tramp, vec![]);
        let mut stacks = FakeStacks::default();

        let started = unsafe { start_secondaries(&registry, &tramp, &plan(0x1000), &mut cores, &mut stacks) };
        assert_eq!(started, Ok(0));
        assert!(cores.sent.is_empty());
        assert!(stacks.mapped.is_empty());
    }

    #[test]
    fn starts_every_ap_in_order() {
        let registry = registry(MAX_CPU, 0);
        let tramp = empty_trampoline();
        let mut cores = FakeCores::new(&registry, &tramp, vec![]);
        let mut stacks = FakeStacks::default();

        let started = unsafe { start_secondaries(&registry, &tramp, &plan(0x1000), &mut cores, &mut stacks) };
        assert_eq!(started, Ok(3));
        assert_eq!(cores.sent, vec![
            Ipi::Init(1), Ipi::Startup(1, PhysAddr(0x8000)),
            Ipi::Init(2), Ipi::Startup(2, PhysAddr(0x8000)),
            Ipi::Init(3), Ipi::Startup(3, PhysAddr(0x8000)),
        ]);
        assert_eq!(stacks.mapped, vec![
            (ap_stack_top(1), AP_STACK_SIZE), (ap_stack_top(2), AP_STACK_SIZE), (ap_stack_top(3), AP_STACK_SIZE),
        ]);
        for record in &registry.records()[1..] {
            assert_eq!(record.status(), CpuStatus::Fenced);
        }

        // every core found its own stack in the trampoline when it was started
        let tops: Vec<u64> = (1..4).map(|i| ap_stack_top(i).0 as u64).collect();
        assert_eq!(cores.stacks_seen, tops);

        // the trampoline holds the parameters of the last core
        let block = tramp.read();
        let (lock, pml4, stack, entry) = (block.ap_lock, block.pml4, block.stack, block.entry_point);
        assert_eq!((lock, pml4), (0, 0x1000));
        assert_eq!(stack, 0xffff_c000_0000_0000 - 3 * 0x5000);
        assert_eq!(entry, 0xffff_8000_0000_4000);
    }

    #[test]
    fn unresponsive_core_is_switched_off() {
        let registry = registry(MAX_CPU, 0);
        let tramp = empty_trampoline();
        let mut cores = FakeCores::new(&registry, &tramp, vec![2]);
        let mut stacks = FakeStacks::default();

        let started = unsafe { start_secondaries(&registry, &tramp, &plan(0x1000), &mut cores, &mut stacks) };
        assert_eq!(started, Ok(2));
        assert_eq!(registry.record(2).unwrap().status(), CpuStatus::Off);
        assert_eq!(registry.record(3).unwrap().status(), CpuStatus::Fenced);
        assert_eq!(cores.sent.len(), 6);
    }

    #[test]
    fn bsp_with_nonzero_id_is_skipped() {
        let registry = registry(3, 1);
        let tramp = empty_trampoline();
        let mut cores = FakeCores::new(&registry, &tramp, vec![]);
        let mut stacks = FakeStacks::default();

        let started = unsafe { start_secondaries(&registry, &tramp, &plan(0x1000), &mut cores, &mut stacks) };
        assert_eq!(started, Ok(2));
        assert_eq!(cores.sent, vec![
            Ipi::Init(0), Ipi::Startup(0, PhysAddr(0x8000)),
            Ipi::Init(2), Ipi::Startup(2, PhysAddr(0x8000)),
        ]);
        assert_eq!(registry.record(1).unwrap().status(), CpuStatus::Running);
    }

    #[test]
    fn pml4_above_4g_sends_nothing() {
        let registry = registry(2, 0);
        let tramp = empty_trampoline();
        let mut cores = FakeCores::new(&registry, &tramp, vec![]);
        let mut stacks = FakeStacks::default();

        let result = unsafe { start_secondaries(&registry, &tramp, &plan(0x2_0000_0000), &mut cores, &mut stacks) };
        assert_eq!(result, Err(StartupError::Pml4AboveFourGiB(0x2_0000_0000)));
        assert!(cores.sent.is_empty());
        assert_eq!(registry.record(1).unwrap().status(), CpuStatus::Off);
    }

    #[test]
    fn stack_failure_aborts() {
        let registry = registry(2, 0);
        let tramp = empty_trampoline();
        let mut cores = FakeCores::new(&registry, &tramp, vec![]);
        let mut stacks = FakeStacks { mapped: vec![], fail: true };

        let result = unsafe { start_secondaries(&registry, &tramp, &plan(0x1000), &mut cores, &mut stacks) };
        assert_eq!(result, Err(StartupError::Stack(MapError::OutOfMemory)));
        assert!(cores.sent.is_empty());
    }
}
