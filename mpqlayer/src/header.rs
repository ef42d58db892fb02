//! MPQ header discovery and parsing

use crate::error::FormatError;
use crate::io::TaggedReader;
use crate::{calculate_sector_size, signatures, Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Header search granularity
const HEADER_ALIGNMENT: u64 = 0x200;

/// Size of the MPQ header for v1
pub const HEADER_SIZE_V1: u32 = 32;
/// Size of the MPQ header for v2
pub const HEADER_SIZE_V2: u32 = 44;
/// Size of the MPQ header for v3
pub const HEADER_SIZE_V3: u32 = 68;
/// Size of the MPQ header for v4
pub const HEADER_SIZE_V4: u32 = 208;

/// MPQ format version constants
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatVersion {
    /// Original MPQ format (32-byte header)
    V1 = 0,
    /// The Burning Crusade format (44-byte header)
    V2 = 1,
    /// Cataclysm Beta format (68-byte header)
    V3 = 2,
    /// Cataclysm+ format (208-byte header)
    V4 = 3,
}

impl FormatVersion {
    /// Minimum header size for this version
    pub fn header_size(self) -> u32 {
        match self {
            FormatVersion::V1 => HEADER_SIZE_V1,
            FormatVersion::V2 => HEADER_SIZE_V2,
            FormatVersion::V3 => HEADER_SIZE_V3,
            FormatVersion::V4 => HEADER_SIZE_V4,
        }
    }

    fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(FormatVersion::V1),
            1 => Some(FormatVersion::V2),
            2 => Some(FormatVersion::V3),
            3 => Some(FormatVersion::V4),
            _ => None,
        }
    }
}

/// User data header preceding the archive ('MPQ\x1B')
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDataHeader {
    /// Maximum size of the user data
    pub user_data_size: u32,
    /// Offset of the MPQ header relative to this header
    pub header_offset: u32,
    /// Size of the user data header
    pub user_data_header_size: u32,
}

impl UserDataHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let _signature = cursor.read_u32::<LittleEndian>()?;
        Ok(Self {
            user_data_size: cursor.read_u32::<LittleEndian>()?,
            header_offset: cursor.read_u32::<LittleEndian>()?,
            user_data_header_size: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// The archive header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Size of the header in bytes as stored
    pub header_size: u32,
    /// Size of the archive in bytes
    pub archive_size: u64,
    /// Format version
    pub format_version: FormatVersion,
    /// Sector size as a power of two multiple of 512
    pub sector_size_shift: u16,
    /// Hash table position relative to the archive start
    pub hash_table_pos: u64,
    /// Block table position relative to the archive start
    pub block_table_pos: u64,
    /// Number of hash table entries
    pub hash_table_size: u32,
    /// Number of block table entries
    pub block_table_size: u32,
    /// Hi-block table position (v2+), zero when absent
    pub hi_block_table_pos: u64,
}

impl ArchiveHeader {
    /// Parse a header from bytes starting at its signature
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE_V1 as usize {
            return Err(Error::truncated("archive header"));
        }

        let mut cursor = Cursor::new(data);
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != signatures::MPQ_ARCHIVE {
            return Err(FormatError::BadSignature.into());
        }

        let header_size = cursor.read_u32::<LittleEndian>()?;
        let archive_size = cursor.read_u32::<LittleEndian>()?;
        let raw_version = cursor.read_u16::<LittleEndian>()?;
        let sector_size_shift = cursor.read_u16::<LittleEndian>()?;
        let hash_table_pos = cursor.read_u32::<LittleEndian>()?;
        let block_table_pos = cursor.read_u32::<LittleEndian>()?;
        let hash_table_size = cursor.read_u32::<LittleEndian>()?;
        let block_table_size = cursor.read_u32::<LittleEndian>()?;

        let mut format_version = FormatVersion::from_raw(raw_version)
            .ok_or(FormatError::UnsupportedVersion(raw_version))?;

        // Old archives carry a bogus header size; trust only what fits
        if header_size < format_version.header_size()
            || data.len() < format_version.header_size() as usize
        {
            log::debug!(
                "Header claims v{} but is only {} bytes, reading as v1",
                raw_version + 1,
                header_size
            );
            format_version = FormatVersion::V1;
        }

        let mut header = Self {
            header_size,
            archive_size: archive_size as u64,
            format_version,
            sector_size_shift,
            hash_table_pos: hash_table_pos as u64,
            block_table_pos: block_table_pos as u64,
            hash_table_size,
            block_table_size,
            hi_block_table_pos: 0,
        };

        if format_version >= FormatVersion::V2 {
            header.hi_block_table_pos = cursor.read_u64::<LittleEndian>()?;
            let hash_table_pos_hi = cursor.read_u16::<LittleEndian>()?;
            let block_table_pos_hi = cursor.read_u16::<LittleEndian>()?;
            header.hash_table_pos |= (hash_table_pos_hi as u64) << 32;
            header.block_table_pos |= (block_table_pos_hi as u64) << 32;
        }

        if format_version >= FormatVersion::V3 {
            let archive_size_64 = cursor.read_u64::<LittleEndian>()?;
            if archive_size_64 != 0 {
                header.archive_size = archive_size_64;
            }
        }

        Ok(header)
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> usize {
        calculate_sector_size(self.sector_size_shift)
    }
}

/// A located header
#[derive(Debug, Clone)]
pub struct HeaderLocation {
    /// Offset of the archive header within the source
    pub archive_offset: u64,
    /// User data header, if the archive was reached through one
    pub user_data: Option<UserDataHeader>,
    /// The parsed header
    pub header: ArchiveHeader,
}

fn read_header_at(reader: &TaggedReader<'_>, offset: u64) -> Result<ArchiveHeader> {
    let available = reader.len().saturating_sub(offset);
    let len = available.min(HEADER_SIZE_V4 as u64) as usize;
    let data = reader.read_vec(offset, len)?;
    ArchiveHeader::parse(&data)
}

/// Scan a source for the archive header
///
/// Headers sit on 512-byte boundaries. A user data header redirects to the
/// real header at its recorded offset.
pub(crate) fn find_header(reader: &TaggedReader<'_>) -> Result<HeaderLocation> {
    let len = reader.len();
    if len < HEADER_SIZE_V1 as u64 {
        return Err(Error::truncated("archive header"));
    }

    let mut offset = 0u64;
    while offset + HEADER_SIZE_V1 as u64 <= len {
        let head = reader.read_vec(offset, 16)?;
        let signature = u32::from_le_bytes([head[0], head[1], head[2], head[3]]);

        match signature {
            signatures::MPQ_ARCHIVE => {
                let header = read_header_at(reader, offset)?;
                log::debug!("Found MPQ header at 0x{offset:X}: {header:?}");
                return Ok(HeaderLocation {
                    archive_offset: offset,
                    user_data: None,
                    header,
                });
            }
            signatures::MPQ_USERDATA => {
                let user_data = UserDataHeader::parse(&head)?;
                let target = offset + user_data.header_offset as u64;
                if target + HEADER_SIZE_V1 as u64 <= len {
                    let target_sig = reader.read_vec(target, 4)?;
                    if target_sig == signatures::MPQ_ARCHIVE.to_le_bytes() {
                        let header = read_header_at(reader, target)?;
                        log::debug!(
                            "Found MPQ header at 0x{target:X} via user data at 0x{offset:X}"
                        );
                        return Ok(HeaderLocation {
                            archive_offset: target,
                            user_data: Some(user_data),
                            header,
                        });
                    }
                }
                log::warn!("User data header at 0x{offset:X} points to no archive");
            }
            _ => {}
        }

        offset += HEADER_ALIGNMENT;
    }

    Err(FormatError::BadSignature.into())
}
