//! Borrowed, read-only views over the memory a driver populated.

use crate::{
    abi::TargetAbi,
    bits::read_unit,
    errors::ReadError,
    primitive::PrimitiveKind,
    reader::decode_primitive,
    value::TypedValue,
};

/// A byte buffer standing at `base` in the dumped process's address space.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion<'a> {
    base: u64,
    bytes: &'a [u8],
}

impl<'a> MemoryRegion<'a> {
    pub fn new(base: u64, bytes: &'a [u8]) -> Self {
        MemoryRegion { base, bytes }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset of `address` into the region, if it is mapped.
    fn offset_of(&self, address: u64) -> Option<usize> {
        address
            .checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|offset| *offset < self.bytes.len())
    }

    pub fn contains(&self, address: u64, len: usize) -> bool {
        address
            .checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .is_some_and(|offset| offset <= self.bytes.len() && len <= self.bytes.len() - offset)
    }

    pub fn read_bytes(&self, address: u64, len: usize) -> Result<&'a [u8], ReadError> {
        if !self.contains(address, len) {
            return Err(ReadError::OutOfBounds { address, len });
        }

        let start = (address - self.base) as usize;
        Ok(&self.bytes[start..start + len])
    }

    /// View of `len` bytes starting `offset` bytes into the region.
    pub fn sub_region(&self, offset: usize, len: usize) -> Result<MemoryRegion<'a>, ReadError> {
        let address = self
            .base
            .checked_add(offset as u64)
            .ok_or(ReadError::OutOfBounds {
                address: self.base,
                len: offset.saturating_add(len),
            })?;
        Ok(MemoryRegion::new(address, self.read_bytes(address, len)?))
    }
}

/// The set of mapped regions pointers are resolved against.
#[derive(Debug, Clone, Default)]
pub struct AddressSpace<'a> {
    regions: Vec<MemoryRegion<'a>>,
}

impl<'a> AddressSpace<'a> {
    pub fn new() -> Self {
        AddressSpace::default()
    }

    /// Adds a region, keeping regions sorted by base address.
    pub fn map(&mut self, region: MemoryRegion<'a>) {
        let at = self
            .regions
            .partition_point(|r| r.base() < region.base());
        self.regions.insert(at, region);
    }

    pub fn with(mut self, region: MemoryRegion<'a>) -> Self {
        self.map(region);
        self
    }

    pub fn regions(&self) -> &[MemoryRegion<'a>] {
        &self.regions
    }

    /// Region containing `address`, if any.
    pub fn find(&self, address: u64) -> Option<&MemoryRegion<'a>> {
        let at = self.regions.partition_point(|r| r.base() <= address);
        at.checked_sub(1)
            .map(|i| &self.regions[i])
            .filter(|r| r.contains(address, 1))
    }

    pub fn read_bytes(&self, address: u64, len: usize) -> Result<&'a [u8], ReadError> {
        self.find(address)
            .ok_or(ReadError::OutOfBounds { address, len })?
            .read_bytes(address, len)
    }

    /// Reads a pointer-sized word in the target byte order.
    pub fn read_word(&self, address: u64, abi: &TargetAbi) -> Result<u64, ReadError> {
        let bytes = self.read_bytes(address, abi.pointer_size as usize)?;
        Ok(read_unit(bytes, abi.endian) as u64)
    }

    pub fn read_primitive(&self, address: u64, kind: PrimitiveKind, abi: &TargetAbi) -> Result<TypedValue, ReadError> {
        let bytes = self.read_bytes(address, kind.size_align(abi).size)?;
        Ok(decode_primitive(kind, bytes, abi))
    }

    /// Bytes of the NUL-terminated string at `address`, without the terminator.
    ///
    /// Returns `Ok(None)` if no terminator is found within `max_len` bytes or
    /// before the end of the containing region.
    pub fn read_cstring(&self, address: u64, max_len: usize) -> Result<Option<&'a [u8]>, ReadError> {
        let region = self
            .find(address)
            .ok_or(ReadError::OutOfBounds { address, len: 1 })?;
        let offset = region
            .offset_of(address)
            .ok_or(ReadError::OutOfBounds { address, len: 1 })?;
        let available = (region.len() - offset).min(max_len.saturating_add(1));
        let bytes = region.read_bytes(address, available)?;

        Ok(bytes.iter().position(|b| *b == 0).map(|nul| &bytes[..nul]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        let data = [1u8, 2, 3, 4];
        let region = MemoryRegion::new(0x1000, &data);

        assert_eq!(region.read_bytes(0x1001, 2).unwrap(), &[2, 3]);
        assert_eq!(
            region.read_bytes(0x1003, 2).unwrap_err(),
            ReadError::OutOfBounds {
                address: 0x1003,
                len: 2
            }
        );
        assert!(region.read_bytes(0xfff, 1).is_err());
    }

    #[test]
    fn test_sub_region() {
        let data = [1u8, 2, 3, 4];
        let region = MemoryRegion::new(0x1000, &data);
        let sub = region.sub_region(2, 2).unwrap();

        assert_eq!(sub.base(), 0x1002);
        assert_eq!(sub.read_bytes(0x1002, 2).unwrap(), &[3, 4]);
    }

    #[test]
    fn test_address_space_find() {
        let low = [0u8; 16];
        let high = [0u8; 16];
        let space = AddressSpace::new()
            .with(MemoryRegion::new(0x2000, &high))
            .with(MemoryRegion::new(0x1000, &low));

        assert_eq!(space.find(0x1008).unwrap().base(), 0x1000);
        assert_eq!(space.find(0x200f).unwrap().base(), 0x2000);
        assert!(space.find(0x1010).is_none());
        assert!(space.find(0x10).is_none());
    }

    #[test]
    fn test_read_word() {
        let data = [0x78u8, 0x56, 0x34, 0x12, 0, 0, 0, 0];
        let space = AddressSpace::new().with(MemoryRegion::new(0x1000, &data));

        assert_eq!(space.read_word(0x1000, &TargetAbi::x86_64()).unwrap(), 0x12345678);
        assert_eq!(space.read_word(0x1000, &TargetAbi::i386()).unwrap(), 0x12345678);
    }

    #[test]
    fn test_read_primitive() {
        let data = (-2i16).to_le_bytes();
        let space = AddressSpace::new().with(MemoryRegion::new(0x1000, &data));
        let abi = TargetAbi::x86_64();

        assert_eq!(
            space.read_primitive(0x1000, PrimitiveKind::I16, &abi).unwrap(),
            TypedValue::Signed(-2)
        );
        assert!(space.read_primitive(0x1000, PrimitiveKind::I32, &abi).is_err());
    }

    #[test]
    fn test_read_cstring() {
        let data = *b"lorem\0ipsum";
        let space = AddressSpace::new().with(MemoryRegion::new(0x1000, &data));

        assert_eq!(space.read_cstring(0x1000, 64).unwrap(), Some(&b"lorem"[..]));
        assert_eq!(space.read_cstring(0x1006, 64).unwrap(), None);
        assert_eq!(space.read_cstring(0x1000, 3).unwrap(), None);
    }

    #[test]
    fn test_region_at_top_of_address_space() {
        let data = *b"top of memory\0\0\0";
        let base = u64::MAX - 15;
        let region = MemoryRegion::new(base, &data);

        assert!(region.contains(u64::MAX, 1));
        assert!(region.contains(base, 16));
        assert!(!region.contains(base, 17));
        assert_eq!(
            region.read_bytes(u64::MAX - 1, 4).unwrap_err(),
            ReadError::OutOfBounds {
                address: u64::MAX - 1,
                len: 4
            }
        );
        assert!(region.sub_region(usize::MAX, 1).is_err());

        let space = AddressSpace::new().with(region);
        assert_eq!(space.find(u64::MAX).unwrap().base(), base);
        assert_eq!(space.read_bytes(u64::MAX, 1).unwrap(), &[0]);
        assert_eq!(space.read_cstring(base, 64).unwrap(), Some(&b"top of memory"[..]));
        assert_eq!(space.read_cstring(u64::MAX, 64).unwrap(), Some(&b""[..]));
    }
}
