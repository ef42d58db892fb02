//! Patch info record and `PTCH` fragment parsing

use super::rle;
use crate::error::PatchError;
use crate::{signatures, Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Size of the `PTCH`, `MD5_` and `XFRM` headers together
pub const PATCH_HEADER_SIZE: usize = 16 + 40 + 12;

const XFRM_HEADER_SIZE: u32 = 12;
const MD5_BLOCK_SIZE: u32 = 40;
pub(super) const TYPE_COPY: u32 = 0x59504F43;
pub(super) const TYPE_BSD0: u32 = 0x30445342;

/// Info record at the start of every stored patch file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInfo {
    /// Length of this record in bytes
    pub length: u32,
    /// Record flags
    pub flags: u32,
    /// Decoded size of the patch fragment
    pub data_size: u32,
    /// MD5 of the decoded fragment
    pub md5: [u8; 16],
}

impl PatchInfo {
    /// Minimum length of the record
    pub const SIZE: usize = 28;

    /// Parse the record
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated("patch info"));
        }

        let mut cursor = Cursor::new(data);
        let length = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let data_size = cursor.read_u32::<LittleEndian>()?;
        let mut md5 = [0u8; 16];
        cursor.read_exact(&mut md5)?;

        if (length as usize) < Self::SIZE {
            return Err(PatchError::BadSignature { what: "patch info" }.into());
        }

        Ok(Self {
            length,
            flags,
            data_size,
            md5,
        })
    }
}

/// Transform carried by a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// The payload is the new content
    Copy,
    /// The payload is a bsdiff stream
    Bsd0,
}

/// Parsed `PTCH`, `MD5_` and `XFRM` headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHeader {
    /// Decoded size of the whole fragment, headers included
    pub patch_data_size: u32,
    /// Content size before patching
    pub size_before: u32,
    /// Content size after patching
    pub size_after: u32,
    /// MD5 of the content before patching
    pub md5_before: [u8; 16],
    /// MD5 of the content after patching
    pub md5_after: [u8; 16],
    /// Size of the `XFRM` block including its header
    pub xfrm_block_size: u32,
    /// Transform type
    pub kind: PatchKind,
}

impl PatchHeader {
    /// Parse the fragment headers
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PATCH_HEADER_SIZE {
            return Err(Error::truncated("patch header"));
        }
        let mut reader = Cursor::new(data);

        if reader.read_u32::<LittleEndian>()? != signatures::PTCH {
            return Err(PatchError::BadSignature { what: "PTCH" }.into());
        }
        let patch_data_size = reader.read_u32::<LittleEndian>()?;
        let size_before = reader.read_u32::<LittleEndian>()?;
        let size_after = reader.read_u32::<LittleEndian>()?;

        if reader.read_u32::<LittleEndian>()? != signatures::PATCH_MD5
            || reader.read_u32::<LittleEndian>()? != MD5_BLOCK_SIZE
        {
            return Err(PatchError::BadSignature { what: "MD5_" }.into());
        }
        let mut md5_before = [0u8; 16];
        reader.read_exact(&mut md5_before)?;
        let mut md5_after = [0u8; 16];
        reader.read_exact(&mut md5_after)?;

        if reader.read_u32::<LittleEndian>()? != signatures::PATCH_XFRM {
            return Err(PatchError::BadSignature { what: "XFRM" }.into());
        }
        let xfrm_block_size = reader.read_u32::<LittleEndian>()?;
        let kind = match reader.read_u32::<LittleEndian>()? {
            TYPE_COPY => PatchKind::Copy,
            TYPE_BSD0 => PatchKind::Bsd0,
            other => return Err(PatchError::UnsupportedType(other).into()),
        };

        log::debug!(
            "PTCH {kind:?}: {size_before} -> {size_after} bytes, md5 {} -> {}",
            hex::encode(md5_before),
            hex::encode(md5_after)
        );

        Ok(Self {
            patch_data_size,
            size_before,
            size_after,
            md5_before,
            md5_after,
            xfrm_block_size,
            kind,
        })
    }

    /// Stored length of the transform payload
    pub fn stored_payload_len(&self) -> usize {
        self.xfrm_block_size.saturating_sub(XFRM_HEADER_SIZE) as usize
    }

    /// Decoded length of the transform payload
    pub fn payload_len(&self) -> usize {
        (self.patch_data_size as usize).saturating_sub(PATCH_HEADER_SIZE)
    }
}

/// A parsed fragment with its decoded payload
#[derive(Debug, Clone)]
pub struct PatchFile {
    /// Fragment headers
    pub header: PatchHeader,
    /// Decoded transform payload
    pub payload: Vec<u8>,
}

impl PatchFile {
    /// Parse a fragment, unpacking an RLE-packed payload
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = PatchHeader::parse(data)?;
        let stored_len = header.stored_payload_len();
        let stored = data
            .get(PATCH_HEADER_SIZE..PATCH_HEADER_SIZE + stored_len)
            .ok_or(PatchError::Overrun("XFRM"))?;

        let payload_len = header.payload_len();
        let payload = if stored_len < payload_len {
            rle::decompress(stored, payload_len)
        } else {
            stored.to_vec()
        };

        Ok(Self { header, payload })
    }

    /// Parse a stored patch file: info record followed by the fragment
    pub fn from_stored(data: &[u8]) -> Result<(PatchInfo, Self)> {
        let info = PatchInfo::parse(data)?;
        let fragment = data
            .get(info.length as usize..)
            .ok_or(Error::truncated("patch fragment"))?;
        Ok((info, Self::parse(fragment)?))
    }
}
