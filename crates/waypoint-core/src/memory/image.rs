//! In-memory address space made of mapped byte regions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::TargetMemory;
use crate::error::{Result, WaypointError};
use crate::types::Address;

#[derive(Debug, Clone)]
struct Region
{
    bytes: Vec<u8>,
    writable: bool,
}

/// A sparse address space assembled from byte buffers.
///
/// Used to treat a module file (or a captured dump) as target memory, and as
/// a deterministic target in tests. Reads and writes may span adjacent
/// regions but fail as a whole if any byte is unmapped.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage
{
    regions: BTreeMap<Address, Region>,
}

impl MemoryImage
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Map `bytes` read-write at `base`, replacing any region starting there.
    pub fn map(&mut self, base: Address, bytes: Vec<u8>) -> &mut Self
    {
        self.regions.insert(base, Region { bytes, writable: true });
        self
    }

    /// Map `bytes` read-only at `base`.
    pub fn map_read_only(&mut self, base: Address, bytes: Vec<u8>) -> &mut Self
    {
        self.regions.insert(base, Region { bytes, writable: false });
        self
    }

    /// Image holding the contents of `path` mapped read-write at `base`.
    ///
    /// ## Errors
    ///
    /// Propagates the I/O error if the file cannot be read.
    pub fn from_file(path: &Path, base: Address) -> Result<Self>
    {
        let mut image = Self::new();
        image.map(base, fs::read(path)?);
        Ok(image)
    }

    /// `(base, length)` of every mapped region in address order.
    pub fn regions(&self) -> impl Iterator<Item = (Address, usize)> + '_
    {
        self.regions.iter().map(|(&base, region)| (base, region.bytes.len()))
    }

    /// Bytes of the region starting at `base`.
    pub fn region_bytes(&self, base: Address) -> Option<&[u8]>
    {
        self.regions.get(&base).map(|region| region.bytes.as_slice())
    }

    /// Region containing `address` and the offset of `address` inside it.
    fn locate(&self, address: Address) -> Option<(Address, usize)>
    {
        let (&base, region) = self.regions.range(..=address).next_back()?;
        let offset = usize::try_from(address.offset_from(base)?).ok()?;
        (offset < region.bytes.len()).then_some((base, offset))
    }

    /// Splits `[address, address + length)` into `(region base, offset, len)`
    /// pieces, or `None` if any byte is unmapped.
    fn chunks(&self, address: Address, length: usize) -> Option<Vec<(Address, usize, usize)>>
    {
        let mut pieces = Vec::new();
        let mut cursor = address;
        let mut remaining = length;
        while remaining > 0 {
            let (base, offset) = self.locate(cursor)?;
            let available = self.regions[&base].bytes.len() - offset;
            let take = available.min(remaining);
            pieces.push((base, offset, take));
            remaining -= take;
            cursor = cursor.checked_add(take as u64)?;
        }
        Some(pieces)
    }
}

impl TargetMemory for MemoryImage
{
    fn read(&self, address: Address, length: usize) -> Result<Vec<u8>>
    {
        let pieces = self
            .chunks(address, length)
            .ok_or(WaypointError::MemoryRead { address, length })?;
        let mut out = Vec::with_capacity(length);
        for (base, offset, take) in pieces {
            out.extend_from_slice(&self.regions[&base].bytes[offset..offset + take]);
        }
        Ok(out)
    }

    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()>
    {
        let length = bytes.len();
        let pieces = self
            .chunks(address, length)
            .filter(|pieces| pieces.iter().all(|(base, _, _)| self.regions[base].writable))
            .ok_or(WaypointError::MemoryWrite { address, length })?;

        let mut consumed = 0;
        for (base, offset, take) in pieces {
            if let Some(region) = self.regions.get_mut(&base) {
                region.bytes[offset..offset + take].copy_from_slice(&bytes[consumed..consumed + take]);
            }
            consumed += take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_reads_span_adjacent_regions()
    {
        let mut image = MemoryImage::new();
        image.map(Address::new(0x1000), vec![1, 2, 3, 4]);
        image.map(Address::new(0x1004), vec![5, 6]);

        assert_eq!(image.read(Address::new(0x1002), 4).unwrap(), vec![3, 4, 5, 6]);
        assert!(image.read(Address::new(0x1004), 3).is_err());
        assert!(image.read(Address::new(0x0fff), 1).is_err());
        assert_eq!(image.read(Address::new(0x2000), 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_write_to_read_only_region_changes_nothing()
    {
        let mut image = MemoryImage::new();
        image.map(Address::new(0x1000), vec![0; 2]);
        image.map_read_only(Address::new(0x1002), vec![0xaa; 2]);

        assert!(matches!(
            image.write(Address::new(0x1001), &[1, 2]),
            Err(WaypointError::MemoryWrite { length: 2, .. })
        ));
        assert_eq!(image.region_bytes(Address::new(0x1000)), Some(&[0u8, 0][..]));

        image.write(Address::new(0x1000), &[7, 8]).unwrap();
        assert_eq!(image.read(Address::new(0x1000), 2).unwrap(), vec![7, 8]);
    }
}
