use bare_metal::PhysAddr;

use super::util::{self, read_array, read_u32, read_u64};
use super::PhysicalMemory;

/// Start of the window searched first, inside the Extended BIOS Data Area.
pub const EBDA_START: usize = 0x8_0000;
/// Size of the EBDA window that is searched.
pub const EBDA_WINDOW: usize = 1024;
/// The BIOS read-only memory area, `[BIOS_START, BIOS_END)`.
pub const BIOS_START: usize = 0xE_0000;
pub const BIOS_END: usize = 0x10_0000;

/// Size of the ACPI 1.0 structure, which is what the first checksum covers.
const V1_LENGTH: usize = 20;
/// Size of the ACPI 2.0 structure.
const V2_LENGTH: usize = 36;

/// The Root System Description Pointer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rsdp {
    oem_id: [u8; 6],
    revision: u8,
    rsdt_address: u32,
    xsdt_address: Option<u64>,
}

impl Rsdp {
    pub const SIGNATURE: &'static [u8; 8] = b"RSD PTR ";

    /// Parse a candidate. It is valid iff the signature matches and its first 20 bytes sum to zero.
    pub fn parse(bytes: &[u8]) -> Option<Rsdp> {
        let v1 = bytes.get(..V1_LENGTH)?;
        if &v1[..8] != Self::SIGNATURE || util::acpi_checksum(v1) != 0 {
            return None;
        }
        let revision = v1[15];

        Some(Rsdp {
            oem_id: read_array(v1, 9)?,
            revision,
            rsdt_address: read_u32(v1, 16)?,
            xsdt_address: None,
        })
    }

    /// Search the EBDA window, then the BIOS area, for a valid root pointer.
    pub fn find<M: PhysicalMemory + ?Sized>(mem: &M) -> Option<(PhysAddr, Rsdp)> {
        let ebda = EBDA_START & !0xf;
        Self::scan(mem, ebda, ebda + EBDA_WINDOW)
            .or_else(|| Self::scan(mem, BIOS_START, BIOS_END))
    }

    fn scan<M: PhysicalMemory + ?Sized>(mem: &M, start: usize, end: usize) -> Option<(PhysAddr, Rsdp)> {
        let window = match mem.read(PhysAddr(start), end - start) {
            Some(window) => window,
            None => {
                warn!("[ACPI] cannot read {:#x}..{:#x}", start, end);
                return None;
            }
        };

        // the signature is guaranteed to be 16 byte aligned
        for offset in (0..window.len()).step_by(16) {
            if let Some(mut rsdp) = Self::parse(&window[offset..]) {
                let addr = PhysAddr(start + offset);
                if rsdp.revision >= 2 {
                    rsdp.xsdt_address = mem.read(addr, V2_LENGTH).and_then(Self::parse_v2);
                }
                debug!("[ACPI] RSDP revision {} at {:p}", rsdp.revision, addr);
                return Some((addr, rsdp));
            }
        }
        None
    }

    /// The XSDT address of an ACPI 2.0 structure whose extended checksum is valid.
    fn parse_v2(bytes: &[u8]) -> Option<u64> {
        let length = read_u32(bytes, 20)? as usize;
        if length < V2_LENGTH || util::acpi_checksum(bytes.get(..V2_LENGTH)?) != 0 {
            warn!("[ACPI] ignoring XSDT pointer of damaged RSDP");
            return None;
        }
        read_u64(bytes, 24)
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn oem_id(&self) -> &[u8; 6] {
        &self.oem_id
    }

    pub fn rsdt_address(&self) -> PhysAddr {
        PhysAddr(self.rsdt_address as usize)
    }

    /// Only present for revision 2 and later.
    pub fn xsdt_address(&self) -> Option<PhysAddr> {
        self.xsdt_address.map(|addr| PhysAddr(addr as usize))
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::test::{fix_checksum, Images};

    /// A root pointer of the given revision. Revision 2 also carries the XSDT address.
    pub fn rsdp(revision: u8, rsdt: u32, xsdt: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(Rsdp::SIGNATURE);
        bytes.push(0);
        bytes.extend_from_slice(b"FRUNNR");
        bytes.push(revision);
        bytes.extend_from_slice(&rsdt.to_le_bytes());
        bytes.extend_from_slice(&(V2_LENGTH as u32).to_le_bytes());
        bytes.extend_from_slice(&xsdt.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        fix_checksum(&mut bytes, 8, V1_LENGTH);
        fix_checksum(&mut bytes, 32, V2_LENGTH);
        bytes
    }

    /// Low memory with empty EBDA and BIOS windows.
    pub fn low_memory() -> Images {
        let mut mem = Images::default();
        mem.place(EBDA_START, vec![0; EBDA_WINDOW]);
        mem.place(BIOS_START, vec![0; BIOS_END - BIOS_START]);
        mem
    }

    pub fn put(mem: &mut Images, window: usize, offset: usize, bytes: &[u8]) {
        mem.bytes_mut(window)[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[test]
    fn checksum_covers_exactly_twenty_bytes() {
        let good = rsdp(0, 0x7fe_0000, 0);
        assert!(Rsdp::parse(&good).is_some());
        for i in 0..V1_LENGTH {
            let mut bad = good.clone();
            bad[i] ^= 0x40;
            assert!(Rsdp::parse(&bad).is_none(), "byte {} not covered", i);
        }
        // the extended part does not matter for the first checksum
        let mut extended = good.clone();
        extended[V1_LENGTH] ^= 0x40;
        assert!(Rsdp::parse(&extended).is_some());
    }

    #[test]
    fn found_in_ebda_first() {
        let mut mem = low_memory();
        put(&mut mem, EBDA_START, 0x40, &rsdp(0, 0x1111_0000, 0));
        put(&mut mem, BIOS_START, 0x100, &rsdp(0, 0x2222_0000, 0));
        let (addr, rsdp) = Rsdp::find(&mem).unwrap();
        assert_eq!(addr, PhysAddr(0x8_0040));
        assert_eq!(rsdp.rsdt_address(), PhysAddr(0x1111_0000));
        assert_eq!(rsdp.oem_id(), b"FRUNNR");
    }

    #[test]
    fn found_in_bios_area() {
        let mut mem = low_memory();
        // misaligned copy in the EBDA is not considered
        put(&mut mem, EBDA_START, 0x48, &rsdp(0, 0x1111_0000, 0));
        put(&mut mem, BIOS_START, 0x1_ffd0, &rsdp(2, 0x2222_0000, 0x3333_0000));
        let (addr, rsdp) = Rsdp::find(&mem).unwrap();
        assert_eq!(addr, PhysAddr(0xf_ffd0));
        assert_eq!(rsdp.revision(), 2);
        assert_eq!(rsdp.xsdt_address(), Some(PhysAddr(0x3333_0000)));
    }

    #[test]
    fn xsdt_address_needs_revision_two() {
        let mut mem = low_memory();
        put(&mut mem, BIOS_START, 0, &rsdp(0, 0x2222_0000, 0x3333_0000));
        let (_, rsdp) = Rsdp::find(&mem).unwrap();
        assert_eq!(rsdp.xsdt_address(), None);
    }

    #[test]
    fn damaged_extension() {
        let mut mem = low_memory();
        let mut bytes = rsdp(2, 0x2222_0000, 0x3333_0000);
        bytes[24] ^= 1;
        put(&mut mem, BIOS_START, 0, &bytes);
        let (_, rsdp) = Rsdp::find(&mem).unwrap();
        assert_eq!(rsdp.rsdt_address(), PhysAddr(0x2222_0000));
        assert_eq!(rsdp.xsdt_address(), None);
    }

    #[test]
    fn nothing_found() {
        assert_eq!(Rsdp::find(&low_memory()), None);
        assert_eq!(Rsdp::find(&Images::default()), None);
    }
}
