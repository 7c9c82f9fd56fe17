//! The two flavours of root table: the RSDT with 32 bit and the XSDT with 64 bit entries.

use bare_metal::PhysAddr;

use super::util::{read_u32, read_u64};
use super::{check_table, AcpiError, PhysicalMemory, Signature, SDT_HEADER_SIZE};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RootKind {
    Rsdt,
    Xsdt,
}

impl RootKind {
    pub fn signature(self) -> Signature {
        match self {
            RootKind::Rsdt => Signature::RSDT,
            RootKind::Xsdt => Signature::XSDT,
        }
    }

    fn entry_size(self) -> usize {
        match self {
            RootKind::Rsdt => 4,
            RootKind::Xsdt => 8,
        }
    }
}

/// A validated RSDT or XSDT.
#[derive(Debug, Clone, Copy)]
pub struct RootTable<'a> {
    kind: RootKind,
    bytes: &'a [u8],
}

impl<'a> RootTable<'a> {
    /// Validate the root table of the given kind at `addr`.
    pub fn load<M: PhysicalMemory + ?Sized>(mem: &'a M, kind: RootKind, addr: PhysAddr) -> Result<RootTable<'a>, AcpiError> {
        let bytes = check_table(mem, addr, kind.signature())?;
        Ok(RootTable { kind, bytes })
    }

    pub fn kind(&self) -> RootKind {
        self.kind
    }

    /// Number of table pointers, any trailing partial entry is ignored.
    pub fn len(&self) -> usize {
        (self.bytes.len() - SDT_HEADER_SIZE) / self.kind.entry_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The table pointers, null ones included.
    pub fn entries(&self) -> impl Iterator<Item = PhysAddr> + 'a {
        let kind = self.kind;
        let bytes = self.bytes;
        (0..self.len()).filter_map(move |i| {
            let offset = SDT_HEADER_SIZE + i * kind.entry_size();
            let addr = match kind {
                RootKind::Rsdt => read_u32(bytes, offset).map(|a| a as usize),
                RootKind::Xsdt => read_u64(bytes, offset).map(|a| a as usize),
            };
            addr.map(PhysAddr)
        })
    }
}
