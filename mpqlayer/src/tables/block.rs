//! Block table and hi-block table

use super::common::TABLE_ENTRY_SIZE;
use crate::{Error, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

bitflags! {
    /// Block table flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BlockFlags: u32 {
        /// File is compressed using PKWARE Data compression library
        const IMPLODE = 0x00000100;
        /// File is compressed using one or more compression methods
        const COMPRESS = 0x00000200;
        /// File is encrypted
        const ENCRYPTED = 0x00010000;
        /// The decryption key for the file is adjusted by the block position
        const FIX_KEY = 0x00020000;
        /// The file is an incremental patch
        const PATCH_FILE = 0x00100000;
        /// File is stored as a single unit, not split into sectors
        const SINGLE_UNIT = 0x01000000;
        /// File is a deletion marker
        const DELETE_MARKER = 0x02000000;
        /// File has checksums for each sector
        const SECTOR_CRC = 0x04000000;
        /// File exists in the archive
        const EXISTS = 0x80000000;

        // Bits we do not interpret are kept as stored
        const _ = !0;
    }
}

/// Block table entry (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    /// Offset of the file data relative to the archive start
    pub file_pos: u64,
    /// Stored (compressed) size
    pub compressed_size: u32,
    /// Uncompressed size
    pub file_size: u32,
    /// Flags for the file
    pub flags: BlockFlags,
}

impl BlockEntry {
    /// Read a block entry from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < TABLE_ENTRY_SIZE {
            return Err(Error::truncated("block entry"));
        }

        Ok(Self {
            file_pos: LittleEndian::read_u32(&data[0..4]) as u64,
            compressed_size: LittleEndian::read_u32(&data[4..8]),
            file_size: LittleEndian::read_u32(&data[8..12]),
            flags: BlockFlags::from_bits_retain(LittleEndian::read_u32(&data[12..16])),
        })
    }

    /// Check if the file is compressed
    pub fn is_compressed(&self) -> bool {
        self.flags.intersects(BlockFlags::IMPLODE | BlockFlags::COMPRESS)
    }

    /// Check if the file is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(BlockFlags::ENCRYPTED)
    }

    /// Check if the file is stored as a single unit
    pub fn is_single_unit(&self) -> bool {
        self.flags.contains(BlockFlags::SINGLE_UNIT)
    }

    /// Check if the file has sector checksums
    pub fn has_sector_crc(&self) -> bool {
        self.flags.contains(BlockFlags::SECTOR_CRC)
    }

    /// Check if the file exists
    pub fn exists(&self) -> bool {
        self.flags.contains(BlockFlags::EXISTS)
    }

    /// Check if the key is adjusted by position
    pub fn has_fix_key(&self) -> bool {
        self.flags.contains(BlockFlags::FIX_KEY)
    }

    /// Check if the entry holds an incremental patch
    pub fn is_patch_file(&self) -> bool {
        self.flags.contains(BlockFlags::PATCH_FILE)
    }

    /// Check if the entry is a tombstone
    pub fn is_delete_marker(&self) -> bool {
        self.flags.contains(BlockFlags::DELETE_MARKER)
    }
}

/// The decrypted block table of one archive
#[derive(Debug, Clone)]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    /// Build a table from decrypted bytes
    pub fn from_bytes(data: &[u8], size: u32) -> Result<Self> {
        if data.len() < size as usize * TABLE_ENTRY_SIZE {
            return Err(Error::truncated("block table"));
        }

        let entries = data
            .chunks_exact(TABLE_ENTRY_SIZE)
            .take(size as usize)
            .map(BlockEntry::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    /// Merge the high 16 bits of every file position
    pub fn apply_hi_block_table(&mut self, hi: &HiBlockTable) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.file_pos |= hi.get_file_pos_high(index);
        }
    }

    /// Get all entries
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Get an entry by index
    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    /// Number of entries
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

/// High 16 bits of file positions (v2+, unencrypted)
#[derive(Debug, Clone)]
pub struct HiBlockTable {
    entries: Vec<u16>,
}

impl HiBlockTable {
    /// Build a table from raw bytes
    pub fn from_bytes(data: &[u8], size: u32) -> Result<Self> {
        if data.len() < size as usize * 2 {
            return Err(Error::truncated("hi-block table"));
        }
        let entries = data
            .chunks_exact(2)
            .take(size as usize)
            .map(LittleEndian::read_u16)
            .collect();
        Ok(Self { entries })
    }

    /// High bits for an entry, already shifted into place
    pub fn get_file_pos_high(&self, index: usize) -> u64 {
        self.entries
            .get(index)
            .map_or(0, |&high| (high as u64) << 32)
    }
}
