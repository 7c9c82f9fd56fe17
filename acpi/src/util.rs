//! Little endian field access and the ACPI checksum.

/// Compute the ACPI checksum over the given slice of ACPI data.
///
/// The checksum is calculated by adding all bytes (wrapping around on overflow).
/// The result must be zero for the checksum to be valid.
pub fn acpi_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0_u8, |acc, b| acc.wrapping_add(*b))
}

pub fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let low = read_u32(data, offset)? as u64;
    let high = read_u32(data, offset + 4)? as u64;
    Some(low | (high << 32))
}

/// Copy a fixed size byte array out of `data`.
pub fn read_array<A: Default + AsMut<[u8]>>(data: &[u8], offset: usize) -> Option<A> {
    let mut array = A::default();
    let len = array.as_mut().len();
    array.as_mut().copy_from_slice(data.get(offset..offset + len)?);
    Some(array)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn checksum_wraps() {
        assert_eq!(acpi_checksum(&[]), 0);
        assert_eq!(acpi_checksum(&[0xff, 0x01]), 0);
        assert_eq!(acpi_checksum(&[0x80, 0x80, 0x05]), 5);
    }

    #[test]
    fn little_endian_fields() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xef, 0xbe, 0xad, 0xde];
        assert_eq!(read_u16(&data, 0), Some(0x5678));
        assert_eq!(read_u32(&data, 4), Some(0xdead_beef));
        assert_eq!(read_u64(&data, 0), Some(0xdead_beef_1234_5678));
        assert_eq!(read_u32(&data, 5), None);
        assert_eq!(read_array::<[u8; 3]>(&data, 1), Some([0x56, 0x34, 0x12]));
    }
}
