use bare_metal::PhysAddr;

use super::util::{self, read_array, read_u32};
use super::{AcpiError, PhysicalMemory, Signature};

/// Size of the header that is common to all ACPI tables.
pub const SDT_HEADER_SIZE: usize = 36;

/// Header of an ACPI system description table.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SdtHeader {
    signature: Signature,
    length: u32,
    revision: u8,
    checksum: u8,
    oem_id: [u8; 6],
    oem_table_id: [u8; 8],
    oem_revision: u32,
    creator_id: u32,
    creator_revision: u32,
}

impl SdtHeader {
    pub fn parse(bytes: &[u8]) -> Option<SdtHeader> {
        Some(SdtHeader {
            signature: Signature(read_array(bytes, 0)?),
            length: read_u32(bytes, 4)?,
            revision: *bytes.get(8)?,
            checksum: *bytes.get(9)?,
            oem_id: read_array(bytes, 10)?,
            oem_table_id: read_array(bytes, 16)?,
            oem_revision: read_u32(bytes, 24)?,
            creator_id: read_u32(bytes, 28)?,
            creator_revision: read_u32(bytes, 32)?,
        })
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn length(&self) -> usize {
        self.length as usize
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn oem_id(&self) -> &[u8; 6] {
        &self.oem_id
    }

    pub fn oem_table_id(&self) -> &[u8; 8] {
        &self.oem_table_id
    }

    pub fn oem_revision(&self) -> u32 {
        self.oem_revision
    }

    pub fn creator_id(&self) -> u32 {
        self.creator_id
    }

    pub fn creator_revision(&self) -> u32 {
        self.creator_revision
    }
}

/// The signature of the table at `addr`, without any validation.
pub fn table_signature<M: PhysicalMemory + ?Sized>(mem: &M, addr: PhysAddr) -> Result<Signature, AcpiError> {
    if addr.is_null() {
        return Err(AcpiError::NullAddress);
    }
    let bytes = mem.read(addr, 4).ok_or(AcpiError::Unreadable(addr))?;
    read_array(bytes, 0).map(Signature).ok_or(AcpiError::Unreadable(addr))
}

/// Validate the table at `addr` and return all of its bytes.
///
/// The signature is compared before the declared length is trusted for anything. The checksum
/// covers exactly the declared length, so bytes past it are never looked at.
pub fn check_table<'m, M: PhysicalMemory + ?Sized>(
    mem: &'m M, addr: PhysAddr, expected: Signature,
) -> Result<&'m [u8], AcpiError> {
    let found = table_signature(mem, addr)?;
    if found != expected {
        return Err(AcpiError::SignatureMismatch { addr, expected, found });
    }

    let length = mem.read(addr, 8)
        .and_then(|header| read_u32(header, 4))
        .ok_or(AcpiError::Unreadable(addr))?;
    if (length as usize) < SDT_HEADER_SIZE {
        return Err(AcpiError::InvalidLength { addr, length });
    }

    let bytes = mem.read(addr, length as usize).ok_or(AcpiError::Unreadable(addr))?;
    if util::acpi_checksum(bytes) != 0 {
        return Err(AcpiError::ChecksumMismatch(addr));
    }
    Ok(bytes)
}
