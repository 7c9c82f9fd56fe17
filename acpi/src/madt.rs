use bare_metal::PhysAddr;

use super::util::read_u32;

/// Offset of the first interrupt controller structure.
const ENTRIES_OFFSET: usize = 44;

/// The Multiple APIC Description Table.
#[derive(Debug, Clone, Copy)]
pub struct Madt<'a> {
    bytes: &'a [u8],
}

impl<'a> Madt<'a> {
    pub const SIGNATURE: &'static [u8; 4] = b"APIC";

    /// Wrap the bytes of a validated table.
    pub fn new(bytes: &'a [u8]) -> Option<Madt<'a>> {
        if bytes.len() < ENTRIES_OFFSET || &bytes[..4] != Self::SIGNATURE {
            return None;
        }
        Some(Madt { bytes })
    }

    /// Returns the physical address at which the local APIC is mapped.
    pub fn local_apic_address(&self) -> PhysAddr {
        PhysAddr(read_u32(self.bytes, 36).unwrap_or(0) as usize)
    }

    /// Bit 0: the system also has dual 8259 PICs.
    pub fn flags(&self) -> u32 {
        read_u32(self.bytes, 40).unwrap_or(0)
    }

    /// Iterate over all MADT entries.
    pub fn iter(&self) -> MadtIter<'a> {
        MadtIter {
            bytes: self.bytes,
            offset: ENTRIES_OFFSET,
        }
    }

    /// Returns an iterator over all local APICS.
    pub fn processor_local_apics(&self) -> impl Iterator<Item = ProcessorLocalApic> + 'a {
        self.iter().filter_map(|e| match e {
            MadtEntry::ProcessorLocalApic(apic) => Some(apic),
            _ => None,
        })
    }
}

/// Walks the variable length entries. Stops early at an entry whose length cannot be right.
#[derive(Debug, Clone)]
pub struct MadtIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for MadtIter<'a> {
    type Item = MadtEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.bytes.get(self.offset..)?;
        if rest.is_empty() {
            return None;
        }
        let length = *rest.get(1).unwrap_or(&0) as usize;
        if length < 2 || length > rest.len() {
            warn!("[ACPI] MADT entry at offset {} has bad length {}", self.offset, length);
            self.offset = self.bytes.len();
            return None;
        }
        self.offset += length;
        Some(MadtEntry::parse(&rest[..length]))
    }
}

impl<'a> core::iter::FusedIterator for MadtIter<'a> {}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MadtEntry<'a> {
    ProcessorLocalApic(ProcessorLocalApic),
    IoApic(&'a [u8]),
    InterruptSourceOverride(&'a [u8]),
    NmiSource(&'a [u8]),
    LocalApicNmi(&'a [u8]),
    /// A type from the specification that is recognized but not interpreted.
    Unsupported(MadtEntryType, &'a [u8]),
    Unknown(u8, &'a [u8]),
}

impl<'a> MadtEntry<'a> {
    /// Interpret one entry, `bytes` covering exactly its declared length.
    pub fn parse(bytes: &'a [u8]) -> MadtEntry<'a> {
        match MadtEntryType::from_u8(bytes[0]) {
            Some(MadtEntryType::ProcessorLocalApic) => match ProcessorLocalApic::parse(bytes) {
                Some(apic) => MadtEntry::ProcessorLocalApic(apic),
                None => MadtEntry::Unsupported(MadtEntryType::ProcessorLocalApic, bytes),
            },
            Some(MadtEntryType::IoApic) => MadtEntry::IoApic(bytes),
            Some(MadtEntryType::InterruptSourceOverride) => MadtEntry::InterruptSourceOverride(bytes),
            Some(MadtEntryType::NmiSource) => MadtEntry::NmiSource(bytes),
            Some(MadtEntryType::LocalApicNmi) => MadtEntry::LocalApicNmi(bytes),
            Some(other) => MadtEntry::Unsupported(other, bytes),
            None => MadtEntry::Unknown(bytes[0], bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum MadtEntryType {
    ProcessorLocalApic = 0,
    IoApic = 1,
    InterruptSourceOverride = 2,
    NmiSource = 3,
    LocalApicNmi = 4,
    LocalApicAddressOverride = 5,
    IoSapic = 6,
    LocalSapic = 7,
    PlatformInterruptSources = 8,
    ProcessorLocalX2Apic = 9,
    LocalX2ApicNmi = 0xa,
    Gic = 0xb,
    Gicd = 0xc,
}

impl MadtEntryType {
    pub fn from_u8(value: u8) -> Option<MadtEntryType> {
        use self::MadtEntryType::*;
        let ty = match value {
            0 => ProcessorLocalApic,
            1 => IoApic,
            2 => InterruptSourceOverride,
            3 => NmiSource,
            4 => LocalApicNmi,
            5 => LocalApicAddressOverride,
            6 => IoSapic,
            7 => LocalSapic,
            8 => PlatformInterruptSources,
            9 => ProcessorLocalX2Apic,
            0xa => LocalX2ApicNmi,
            0xb => Gic,
            0xc => Gicd,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            MadtEntryType::ProcessorLocalApic => "Processor Local APIC",
            MadtEntryType::IoApic => "I/O APIC",
            MadtEntryType::InterruptSourceOverride => "Interrupt Source Override",
            MadtEntryType::NmiSource => "NMI Source",
            MadtEntryType::LocalApicNmi => "Local APIC NMI",
            MadtEntryType::LocalApicAddressOverride => "Local APIC Address Override",
            MadtEntryType::IoSapic => "I/O SAPIC",
            MadtEntryType::LocalSapic => "Local SAPIC",
            MadtEntryType::PlatformInterruptSources => "Platform Interrupt Sources",
            MadtEntryType::ProcessorLocalX2Apic => "Processor Local x2APIC",
            MadtEntryType::LocalX2ApicNmi => "Local x2APIC NMI",
            MadtEntryType::Gic => "GIC",
            MadtEntryType::Gicd => "GICD",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ProcessorLocalApic {
    processor_id: u8,
    apic_id: u8,
    /// bit 0 = processor enabled
    flags: u32,
}

impl ProcessorLocalApic {
    pub const LENGTH: usize = 8;

    pub fn new(processor_id: u8, apic_id: u8, flags: u32) -> Self {
        ProcessorLocalApic { processor_id, apic_id, flags }
    }

    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LENGTH {
            return None;
        }
        Some(ProcessorLocalApic::new(bytes[2], bytes[3], read_u32(bytes, 4)?))
    }

    /// Return the ACPI processor ID of the CPU that this APIC belongs to.
    pub fn processor_id(&self) -> u8 {
        self.processor_id
    }

    /// Return the id of this APIC.
    pub fn apic_id(&self) -> u8 {
        self.apic_id
    }

    /// Check whether the CPU belonging to this APIC is enabled.
    pub fn processor_enabled(&self) -> bool {
        self.flags & 1 != 0
    }
}
