//! Walks the whole table tree and collects what the MADT says about the processors.

use bare_metal::PhysAddr;

use super::{check_table, table_signature};
use super::{AcpiError, Madt, MadtEntry, PhysicalMemory, ProcessorLocalApic, RootKind, RootTable, Rsdp, Signature};

/// Number of processor entries kept in a `Topology`.
pub const MAX_RECORDED_PROCESSORS: usize = 256;

/// What the firmware reports about the processors.
#[derive(Clone)]
pub struct Topology {
    /// Number of Processor Local APIC entries, whether recorded or not.
    pub cpu_count: usize,
    /// Local APIC address from the MADT header, if a MADT was found.
    pub local_apic_address: Option<PhysAddr>,
    /// The root table that was walked.
    pub root: Option<RootKind>,
    processors: [Option<ProcessorLocalApic>; MAX_RECORDED_PROCESSORS],
    recorded: usize,
}

impl Topology {
    pub const fn new() -> Topology {
        Topology {
            cpu_count: 0,
            local_apic_address: None,
            root: None,
            processors: [None; MAX_RECORDED_PROCESSORS],
            recorded: 0,
        }
    }

    /// The processor entries in table order, at most `MAX_RECORDED_PROCESSORS` of them.
    pub fn processors(&self) -> impl Iterator<Item = &ProcessorLocalApic> {
        self.processors[..self.recorded].iter().filter_map(|p| p.as_ref())
    }

    fn add_processor(&mut self, apic: ProcessorLocalApic) {
        self.cpu_count += 1;
        if self.recorded < MAX_RECORDED_PROCESSORS {
            self.processors[self.recorded] = Some(apic);
            self.recorded += 1;
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Topology::new()
    }
}

/// Find the root pointer, pick the XSDT (or else the RSDT) and dispatch every table it lists.
pub fn walk<M: PhysicalMemory + ?Sized>(mem: &M) -> Result<Topology, AcpiError> {
    let (_, rsdp) = Rsdp::find(mem).ok_or(AcpiError::NoRsdp)?;
    let root = load_root(mem, &rsdp)?;
    debug!("[ACPI] walking {:?} with {} entries", root.kind(), root.len());

    let mut topology = Topology::new();
    topology.root = Some(root.kind());
    for addr in root.entries().filter(|addr| !addr.is_null()) {
        dispatch(mem, addr, &mut topology);
    }
    Ok(topology)
}

fn load_root<'m, M: PhysicalMemory + ?Sized>(mem: &'m M, rsdp: &Rsdp) -> Result<RootTable<'m>, AcpiError> {
    if let Some(xsdt) = rsdp.xsdt_address() {
        match RootTable::load(mem, RootKind::Xsdt, xsdt) {
            Ok(root) => return Ok(root),
            Err(err) => debug!("[ACPI] XSDT at {:p} unusable: {:?}", xsdt, err),
        }
    }
    RootTable::load(mem, RootKind::Rsdt, rsdp.rsdt_address()).map_err(|err| {
        debug!("[ACPI] RSDT at {:p} unusable: {:?}", rsdp.rsdt_address(), err);
        AcpiError::NoRootTable
    })
}

/// Validate the table at `addr` under its own signature and interpret it if it is a MADT.
fn dispatch<M: PhysicalMemory + ?Sized>(mem: &M, addr: PhysAddr, topology: &mut Topology) {
    let signature = match table_signature(mem, addr) {
        Ok(signature) => signature,
        Err(_) => return,
    };
    let bytes = match check_table(mem, addr, signature) {
        Ok(bytes) => bytes,
        Err(err) => {
            trace!("[ACPI] skipping table at {:p}: {:?}", addr, err);
            return;
        }
    };

    if signature == Signature::MADT {
        if let Some(madt) = Madt::new(bytes) {
            read_madt(&madt, topology);
        }
    } else if signature.is_known() {
        trace!("[ACPI] found {} at {:p}", signature, addr);
    }
}

fn read_madt(madt: &Madt, topology: &mut Topology) {
    topology.local_apic_address = Some(madt.local_apic_address());

    for entry in madt.iter() {
        match entry {
            MadtEntry::ProcessorLocalApic(apic) => {
                debug!(
                    "[ACPI] processor {} with APIC id {}{}",
                    apic.processor_id(),
                    apic.apic_id(),
                    if apic.processor_enabled() { "" } else { " (disabled)" }
                );
                topology.add_processor(apic);
            }
            MadtEntry::IoApic(_)
            | MadtEntry::InterruptSourceOverride(_)
            | MadtEntry::NmiSource(_)
            | MadtEntry::LocalApicNmi(_) => {}
            MadtEntry::Unsupported(ty, _) => {
                info!("[ACPI] MADT IC Table Type {} is not supported", ty.name());
            }
            MadtEntry::Unknown(ty, _) => {
                info!("[ACPI] Unknown MADT IC Table Type: {:#x}", ty);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::madt::test::{local_apic, madt_body};
    use crate::rsdp::test::{low_memory, put, rsdp};
    use crate::rsdp::BIOS_START;
    use crate::test::{table, Images};

    const XSDT: usize = 0x7fe_0000;
    const RSDT: usize = 0x7fd_0000;
    const MADT: usize = 0x7fe_1000;
    const FACP: usize = 0x7fe_2000;

    fn xsdt(entries: &[usize]) -> Vec<u8> {
        let mut body = Vec::new();
        for e in entries {
            body.extend_from_slice(&(*e as u64).to_le_bytes());
        }
        table(b"XSDT", &body)
    }

    fn rsdt(entries: &[usize]) -> Vec<u8> {
        let mut body = Vec::new();
        for e in entries {
            body.extend_from_slice(&(*e as u32).to_le_bytes());
        }
        table(b"RSDT", &body)
    }

    fn madt(cpus: u8) -> Vec<u8> {
        let entries: Vec<_> = (0..cpus).map(|i| local_apic(i, i)).collect();
        table(b"APIC", &madt_body(&entries))
    }

    fn machine(revision: u8) -> Images {
        let mut mem = low_memory();
        put(&mut mem, BIOS_START, 0xa0, &rsdp(revision, RSDT as u32, XSDT as u64));
        mem
    }

    #[test]
    fn no_rsdp() {
        assert_eq!(walk(&low_memory()).err(), Some(AcpiError::NoRsdp));
    }

    #[test]
    fn xsdt_is_preferred() {
        let mut mem = machine(2);
        mem.place(XSDT, xsdt(&[FACP, 0, MADT]));
        // the RSDT points at a MADT with a different processor count
        mem.place(RSDT, rsdt(&[0x7fc_0000]));
        mem.place(0x7fc_0000, madt(1));
        mem.place(MADT, madt(3));
        mem.place(FACP, table(b"FACP", &[0; 16]));

        let topology = walk(&mem).unwrap();
        assert_eq!(topology.root, Some(RootKind::Xsdt));
        assert_eq!(topology.cpu_count, 3);
        assert_eq!(topology.local_apic_address, Some(PhysAddr(0xfee0_0000)));
        let ids: Vec<u8> = topology.processors().map(|p| p.apic_id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn rsdt_fallback() {
        // revision 0 has no XSDT pointer at all
        let mut mem = machine(0);
        mem.place(XSDT, xsdt(&[MADT]));
        mem.place(RSDT, rsdt(&[0x7fc_0000]));
        mem.place(0x7fc_0000, madt(2));
        mem.place(MADT, madt(4));

        let topology = walk(&mem).unwrap();
        assert_eq!(topology.root, Some(RootKind::Rsdt));
        assert_eq!(topology.cpu_count, 2);

        // a broken XSDT also falls back
        let mut mem = machine(2);
        let mut broken = xsdt(&[MADT]);
        broken[20] ^= 0xff;
        mem.place(XSDT, broken);
        mem.place(RSDT, rsdt(&[0x7fc_0000]));
        mem.place(0x7fc_0000, madt(2));
        mem.place(MADT, madt(4));
        assert_eq!(walk(&mem).unwrap().cpu_count, 2);
    }

    #[test]
    fn no_usable_root() {
        let mem = machine(2);
        assert_eq!(walk(&mem).err(), Some(AcpiError::NoRootTable));
    }

    #[test]
    fn six_processors() {
        let mut mem = machine(2);
        mem.place(XSDT, xsdt(&[MADT]));
        mem.place(MADT, madt(6));
        assert_eq!(walk(&mem).unwrap().cpu_count, 6);
    }

    #[test]
    fn broken_and_unknown_tables_are_skipped() {
        let mut mem = machine(2);
        let mut bad_madt = madt(2);
        bad_madt[40] ^= 1;
        mem.place(XSDT, xsdt(&[MADT, FACP, 0x7fe_3000]));
        mem.place(MADT, bad_madt);
        mem.place(FACP, table(b"ZZZZ", &[]));
        mem.place(0x7fe_3000, madt(1));

        let topology = walk(&mem).unwrap();
        assert_eq!(topology.cpu_count, 1);
    }

    #[test]
    fn unreadable_entry_is_skipped() {
        let mut mem = machine(2);
        mem.place(XSDT, xsdt(&[0x1234_5678, MADT]));
        mem.place(MADT, madt(2));
        assert_eq!(walk(&mem).unwrap().cpu_count, 2);
    }
}
