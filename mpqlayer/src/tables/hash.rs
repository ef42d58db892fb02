//! Hash table and open-addressing lookup

use super::common::TABLE_ENTRY_SIZE;
use crate::error::FormatError;
use crate::hash::NameHashes;
use crate::{is_power_of_two, Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Hash table entry (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEntry {
    /// The hash of the full file name (part A)
    pub name_1: u32,
    /// The hash of the full file name (part B)
    pub name_2: u32,
    /// The language of the file (Windows LANGID)
    pub locale: u16,
    /// The platform the file is used for
    pub platform: u16,
    /// Block table index or special value
    pub block_index: u32,
}

impl HashEntry {
    /// Value indicating the hash entry has never been used
    pub const FREE: u32 = 0xFFFFFFFF;
    /// Value indicating the hash entry was deleted
    pub const DELETED: u32 = 0xFFFFFFFE;

    /// Create an empty hash entry
    pub fn empty() -> Self {
        Self {
            name_1: 0xFFFFFFFF,
            name_2: 0xFFFFFFFF,
            locale: 0xFFFF,
            platform: 0xFFFF,
            block_index: Self::FREE,
        }
    }

    /// Check if this entry has never been used
    pub fn is_free(&self) -> bool {
        self.block_index == Self::FREE
    }

    /// Check if this entry was deleted
    pub fn is_deleted(&self) -> bool {
        self.block_index == Self::DELETED
    }

    /// Check if this entry points into the block table
    pub fn is_valid(&self) -> bool {
        self.block_index < Self::DELETED
    }

    /// Read a hash entry from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < TABLE_ENTRY_SIZE {
            return Err(Error::truncated("hash entry"));
        }

        Ok(Self {
            name_1: LittleEndian::read_u32(&data[0..4]),
            name_2: LittleEndian::read_u32(&data[4..8]),
            locale: LittleEndian::read_u16(&data[8..10]),
            platform: LittleEndian::read_u16(&data[10..12]),
            block_index: LittleEndian::read_u32(&data[12..16]),
        })
    }

    fn matches(&self, hashes: &NameHashes) -> bool {
        self.name_1 == hashes.name_a && self.name_2 == hashes.name_b
    }
}

/// The decrypted hash table of one archive
#[derive(Debug, Clone)]
pub struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    /// Build a table from decrypted bytes
    pub fn from_bytes(data: &[u8], size: u32) -> Result<Self> {
        if !is_power_of_two(size) {
            return Err(FormatError::TableSizeNotPowerOfTwo {
                table: "hash table",
                size,
            }
            .into());
        }
        if data.len() < size as usize * TABLE_ENTRY_SIZE {
            return Err(Error::truncated("hash table"));
        }

        let entries = data
            .chunks_exact(TABLE_ENTRY_SIZE)
            .take(size as usize)
            .map(HashEntry::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    /// Get all entries
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Get an entry by index
    pub fn get(&self, index: usize) -> Option<&HashEntry> {
        self.entries.get(index)
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Find the entry for a file
    ///
    /// The search starts at the name's table slot and walks forward with
    /// wraparound, skipping deleted slots, until a free slot is reached or
    /// every slot was visited once. Among entries with matching name hashes
    /// for which `is_live` holds, an exact `locale` match wins; otherwise the
    /// neutral-locale entry is returned.
    pub fn find_file(
        &self,
        hashes: &NameHashes,
        locale: u16,
        is_live: impl Fn(u32) -> bool,
    ) -> Option<(usize, &HashEntry)> {
        let mask = self.entries.len() - 1;
        let start = hashes.offset as usize & mask;
        let mut neutral = None;

        for step in 0..self.entries.len() {
            let index = (start + step) & mask;
            let entry = &self.entries[index];

            if entry.is_free() {
                break;
            }
            if !entry.is_valid() || !entry.matches(hashes) || !is_live(entry.block_index) {
                continue;
            }

            if entry.locale == locale && entry.platform == 0 {
                return Some((index, entry));
            }
            if entry.locale == 0 && entry.platform == 0 && neutral.is_none() {
                neutral = Some((index, entry));
            }
        }

        neutral
    }
}
