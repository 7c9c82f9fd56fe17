//! Finding out how many CPUs there are.

use acpi::{AcpiError, PhysicalMemory, Topology};

use crate::smp::{CpuRegistry, CpuStatus};

/// Walk the ACPI tables and record the number of usable CPUs in the registry.
pub fn discover<M: PhysicalMemory + ?Sized>(registry: &CpuRegistry, mem: &M) -> usize {
    apply_discovery(registry, acpi::walk(mem))
}

/// Turn what the firmware reported into the CPU count, falling back to a single CPU when the
/// tables are unusable. Every counted core other than the BSP is marked off until it is started.
pub fn apply_discovery(registry: &CpuRegistry, discovered: Result<Topology, AcpiError>) -> usize {
    let mut count = match discovered {
        Ok(topology) => {
            if let Some(addr) = topology.local_apic_address {
                debug!("[ACPI] local APIC registers at {:p}", addr);
            }
            for cpu in topology.processors() {
                debug!("[ACPI] processor {} has APIC ID {}{}", cpu.processor_id(), cpu.apic_id(),
                       if cpu.processor_enabled() { "" } else { " (disabled)" });
            }
            topology.cpu_count
        }
        Err(err) => {
            warn!("[ACPI] no usable tables ({:?}), assuming a single CPU", err);
            1
        }
    };

    if count > registry.capacity() {
        warn!("[ACPI] found {} CPUs, but this kernel only supports {} CPUs", count, registry.capacity());
        count = registry.capacity();
    }
    if count == 0 {
        warn!("[ACPI] no CPUs found, assuming there is one");
        count = 1;
    }

    registry.set_count(count);
    // records are indexed by APIC ID, which assumes the firmware numbers the cores 0..count
    for record in registry.records().iter().take(count).filter(|r| !r.is_bsp()) {
        record.set_status(CpuStatus::Off);
    }
    info!("[ACPI] {} CPU(s) will be used", count);
    count
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::MAX_CPU;
    use bare_metal::PhysAddr;

    fn registry() -> CpuRegistry {
        let registry = CpuRegistry::new();
        registry.bp_init();
        registry.claim_bsp(0).unwrap();
        registry
    }

    fn topology(cpu_count: usize) -> Topology {
        let mut topology = Topology::new();
        topology.cpu_count = cpu_count;
        topology
    }

    /// Low memory without any firmware tables in it.
    struct BlankMemory(Vec<u8>);

    impl PhysicalMemory for BlankMemory {
        fn read(&self, _addr: PhysAddr, len: usize) -> Option<&[u8]> {
            self.0.get(..len)
        }
    }

    #[test]
    fn no_rsdp_means_one_cpu() {
        let registry = registry();
        let mem = BlankMemory(vec![0; 0x2_0000]);
        assert_eq!(discover(&registry, &mem), 1);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.record(0).unwrap().status(), CpuStatus::Running);
    }

    #[test]
    fn clamped_to_capacity() {
        let registry = registry();
        assert_eq!(apply_discovery(&registry, Ok(topology(6))), MAX_CPU);
        assert_eq!(registry.count(), 4);
    }

    #[test]
    fn zero_cpus_become_one() {
        let registry = registry();
        assert_eq!(apply_discovery(&registry, Ok(topology(0))), 1);
    }

    #[test]
    fn n_cpus_below_capacity() {
        for n in 1..=MAX_CPU {
            let registry = registry();
            assert_eq!(apply_discovery(&registry, Ok(topology(n))), n);
        }
    }

    #[test]
    fn other_cores_are_off() {
        let registry = registry();
        apply_discovery(&registry, Ok(topology(2)));
        assert_eq!(registry.record(0).unwrap().status(), CpuStatus::Running);
        assert_eq!(registry.record(1).unwrap().status(), CpuStatus::Off);
        // not discovered, not touched
        assert_eq!(registry.record(2).unwrap().status(), CpuStatus::None);
    }

    #[test]
    fn unreadable_tables_mean_one_cpu() {
        let registry = registry();
        assert_eq!(apply_discovery(&registry, Err(AcpiError::NoRootTable)), 1);
    }
}
