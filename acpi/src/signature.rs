use core::fmt;
use core::str;

/// The four character signature of a system description table.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Signature(pub [u8; 4]);

impl Signature {
    pub const MADT: Signature = Signature(*b"APIC");
    pub const RSDT: Signature = Signature(*b"RSDT");
    pub const XSDT: Signature = Signature(*b"XSDT");

    /// Tables defined or reserved by the ACPI specification. Only the MADT is interpreted,
    /// the others are merely recognized.
    pub const KNOWN: &'static [&'static [u8; 4]] = &[
        b"APIC", b"BERT", b"BGRT", b"BOOT", b"CPEP", b"CSRT", b"DBG2", b"DBGP", b"DMAR", b"DRTM",
        b"DSDT", b"ECDT", b"EINJ", b"ERST", b"ETDT", b"FACP", b"FACS", b"FPDT", b"GTDT", b"HEST",
        b"HPET", b"IBFT", b"IVRS", b"MCFG", b"MCHI", b"MPST", b"MSCT", b"MSDM", b"PMTT", b"PSDT",
        b"RASF", b"RSDT", b"SBST", b"SLIC", b"SLIT", b"SPCR", b"SPMI", b"SRAT", b"SSDT", b"TCPA",
        b"TPM2", b"UEFI", b"WAET", b"WDAT", b"XSDT",
    ];

    /// Whether the signature names a table from the ACPI specification,
    /// including the OEM0..OEMZ range reserved for OEM tables.
    pub fn is_known(&self) -> bool {
        Self::KNOWN.iter().any(|known| **known == self.0) || self.is_oem()
    }

    fn is_oem(&self) -> bool {
        let last = self.0[3];
        &self.0[..3] == b"OEM" && (last.is_ascii_digit() || last.is_ascii_uppercase())
    }

    pub fn as_str(&self) -> Option<&str> {
        str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "\"{}\"", s),
            None => write!(f, "{:02x?}", self.0),
        }
    }
}
