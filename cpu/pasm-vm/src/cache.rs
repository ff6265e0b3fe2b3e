//! Direct-mapped, write-back data cache over the 32-bit address space.
//!
//! Each slot packs address tag, operand, and dirty flag into one 64-bit word
//! (operand in bits 0-31, dirty in bit 32, the upper 31 bits of the address
//! in bits 33-63). The packing is an implementation detail; every public
//! operation here takes or returns the typed [`CacheEntry`] instead.

use crate::errors::VmError;

pub const MIN_CACHE_BITS: u8 = 1;
pub const MAX_CACHE_BITS: u8 = 6;

const DIRTY_BIT: u64 = 1 << 32;

/// A decoded cache slot: the address it holds, its operand, and whether the
/// operand has been modified relative to RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub address: u32,
    pub operand: u32,
    pub dirty: bool,
}

fn pack(address: u32, operand: u32, dirty: bool) -> u64 {
    let tag = u64::from(address >> 1);
    (tag << 33) | u64::from(operand) | if dirty { DIRTY_BIT } else { 0 }
}

/// Reconstructs the full stored address for `raw`, without folding in the
/// slot index (mirrors the original engine's two-step extraction: the tag
/// bits are recovered first, the index is OR'd in by the caller).
fn tag_address(raw: u64, cache_bits: u8) -> u32 {
    ((raw >> (32 + u32::from(cache_bits))) as u32) << cache_bits
}

fn unpack(raw: u64, slot_index: u32, cache_bits: u8) -> CacheEntry {
    CacheEntry {
        address: tag_address(raw, cache_bits) | slot_index,
        operand: raw as u32,
        dirty: raw & DIRTY_BIT != 0,
    }
}

#[derive(Clone)]
pub struct Cache {
    entries: Box<[u64]>,
    cache_bits: u8,
}

impl Cache {
    pub fn new(cache_bits: u8) -> Result<Self, VmError> {
        if !(MIN_CACHE_BITS..=MAX_CACHE_BITS).contains(&cache_bits) {
            return Err(VmError::InvalidCacheBits(cache_bits));
        }

        let size = 1_usize << cache_bits;
        Ok(Self { entries: vec![0_u64; size].into_boxed_slice(), cache_bits })
    }

    #[must_use]
    pub fn cache_bits(&self) -> u8 {
        self.cache_bits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn index(&self, address: u32) -> u32 {
        address & ((1_u32 << self.cache_bits) - 1)
    }

    #[must_use]
    pub fn lookup(&self, address: u32) -> Option<u32> {
        let idx = self.index(address);
        let raw = self.entries[idx as usize];
        let stored_address = tag_address(raw, self.cache_bits) | idx;
        (stored_address == address).then_some(raw as u32)
    }

    /// True iff the slot for `address` is occupied and holds a different address,
    /// i.e. inserting here would require evicting unrelated data. The loader uses
    /// this to avoid stomping primed data with a redundant zero value.
    #[must_use]
    pub fn will_overwrite(&self, address: u32) -> bool {
        let idx = self.index(address);
        let raw = self.entries[idx as usize];
        if raw == 0 {
            return false;
        }

        let stored_address = tag_address(raw, self.cache_bits) | idx;
        stored_address != address
    }

    /// Inserts `operand` at `address`. Returns the evicted entry when a dirty
    /// entry for a *different* address was replaced; `None` otherwise.
    ///
    /// If the slot already holds `address` with a different operand, the
    /// operand is updated in place and marked dirty without reporting an
    /// eviction -- this coalesces repeated stores to the same cell.
    pub fn insert(&mut self, address: u32, operand: u32, as_dirty: bool) -> Option<CacheEntry> {
        let idx = self.index(address);
        let raw = self.entries[idx as usize];

        let stored_address = tag_address(raw, self.cache_bits) | idx;
        let stored_operand = raw as u32;
        let was_dirty = raw & DIRTY_BIT != 0;

        if stored_address == address && stored_operand == operand {
            return None;
        }

        let dirty = if stored_address == address {
            // Same cell, different operand: coalesce, no eviction needed.
            true
        } else {
            as_dirty
        };
        self.entries[idx as usize] = pack(address, operand, dirty);

        if stored_address == address {
            None
        } else if was_dirty {
            log::trace!(
                "evicting dirty slot {idx}: address={stored_address}, operand={stored_operand}"
            );
            Some(CacheEntry { address: stored_address, operand: stored_operand, dirty: true })
        } else {
            None
        }
    }

    /// Writes `entry`'s operand back into `ram` at its instruction slot.
    pub fn writeback(entry: CacheEntry, ram: &mut [u8], instruction_size: u8) {
        let operand_size = usize::from(instruction_size - 1);
        let ram_index = entry.address as usize * usize::from(instruction_size);
        ram[ram_index + 1..ram_index + 1 + operand_size]
            .copy_from_slice(&entry.operand.to_le_bytes()[..operand_size]);
    }

    /// The dispatcher's primary data read: hit returns the cached operand;
    /// miss verifies the RAM slot is a data cell (opcode `0x00`), reads it,
    /// and primes the cache (evicting and writing back a dirty entry if
    /// necessary).
    pub fn populate_or_read(
        &mut self,
        address: u32,
        ram: &mut [u8],
        operand_size: u8,
    ) -> Result<(u32, Option<CacheEntry>), VmError> {
        if let Some(value) = self.lookup(address) {
            return Ok((value, None));
        }

        let instruction_size = operand_size + 1;
        let ram_index = address as usize * usize::from(instruction_size);
        let opcode = ram[ram_index];
        if opcode != 0 {
            return Err(VmError::NonDataLoad { address });
        }

        let mut bytes = [0_u8; 4];
        bytes[..usize::from(operand_size)]
            .copy_from_slice(&ram[ram_index + 1..ram_index + 1 + usize::from(operand_size)]);
        let operand = u32::from_le_bytes(bytes);

        let evicted = self.insert(address, operand, false);
        if let Some(evicted) = evicted {
            Self::writeback(evicted, ram, instruction_size);
        }

        Ok((operand, evicted))
    }

    /// Writes back every dirty entry, then clears the array.
    pub fn flush_all(&mut self, ram: &mut [u8], instruction_size: u8) {
        for idx in 0..self.entries.len() {
            let raw = self.entries[idx];
            if raw == 0 {
                continue;
            }

            let entry = unpack(raw, idx as u32, self.cache_bits);
            if entry.dirty {
                Self::writeback(entry, ram, instruction_size);
            }
        }

        self.reset();
    }

    /// Clears the array without writing anything back.
    pub fn reset(&mut self) {
        self.entries.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_address_mod_size() {
        for cache_bits in MIN_CACHE_BITS..=MAX_CACHE_BITS {
            let cache = Cache::new(cache_bits).unwrap();
            for addr in 0_u32..64 {
                assert_eq!(cache.index(addr), addr % (1 << cache_bits));
            }
        }
    }

    #[test]
    fn rejects_cache_bits_out_of_range() {
        assert!(Cache::new(0).is_err());
        assert!(Cache::new(7).is_err());
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut cache = Cache::new(2).unwrap();
        cache.insert(5, 42, true);
        assert_eq!(cache.lookup(5), Some(42));
    }

    #[test]
    fn insert_non_zero_eviction_means_previous_was_dirty() {
        let mut cache = Cache::new(1).unwrap(); // 2 slots, addresses 0/2/4 collide on slot 0
        assert_eq!(cache.insert(0, 1, true), None);
        let evicted = cache.insert(2, 2, true);
        assert_eq!(evicted, Some(CacheEntry { address: 0, operand: 1, dirty: true }));
    }

    #[test]
    fn insert_same_address_new_operand_coalesces_without_eviction() {
        let mut cache = Cache::new(2).unwrap();
        cache.insert(5, 1, true);
        let evicted = cache.insert(5, 2, true);
        assert_eq!(evicted, None);
        assert_eq!(cache.lookup(5), Some(2));
    }

    #[test]
    fn writeback_writes_little_endian_operand() {
        let mut ram = vec![0_u8; 16];
        let entry = CacheEntry { address: 1, operand: 0x1234, dirty: true };
        Cache::writeback(entry, &mut ram, 3); // instruction_size 3 -> operand_size 2
        assert_eq!(&ram[4..6], &0x1234_u16.to_le_bytes());
    }

    #[test]
    fn populate_or_read_hits_cache_without_touching_ram() {
        let mut cache = Cache::new(2).unwrap();
        cache.insert(1, 99, false);
        let mut ram = vec![0xFF_u8; 16];
        let (value, evicted) = cache.populate_or_read(1, &mut ram, 1).unwrap();
        assert_eq!(value, 99);
        assert!(evicted.is_none());
    }

    #[test]
    fn populate_or_read_rejects_non_data_cell() {
        let mut cache = Cache::new(2).unwrap();
        let mut ram = vec![0_u8; 16];
        ram[2 * 2] = 10; // opcode LDA_IMM at slot 2, not a data marker
        assert!(matches!(
            cache.populate_or_read(2, &mut ram, 1),
            Err(VmError::NonDataLoad { address: 2 })
        ));
    }

    #[test]
    fn flush_all_only_writes_dirty_entries() {
        let mut cache = Cache::new(1).unwrap();
        cache.insert(0, 7, false); // clean
        cache.insert(1, 9, true); // dirty
        let mut ram = vec![0xAA_u8; 16];
        cache.flush_all(&mut ram, 2);
        assert_eq!(ram[1], 0xAA, "clean entry must not be written back");
        assert_eq!(ram[3], 9, "dirty entry must be written back");
    }
}
