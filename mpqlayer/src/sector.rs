//! Sector-level decoding of stored files
//!
//! A stored file is either a single unit or a run of fixed-size sectors.
//! Compressed sectored files start with a table of sector offsets; when the
//! file carries checksums the table has one more entry and the checksum
//! block sits between the last two offsets.

use crate::compression::decompress_sector;
use crate::crypto::decrypt_bytes;
use crate::error::CodecError;
use crate::io::TaggedReader;
use crate::tables::BlockFlags;
use crate::{Error, Result};
use adler2::Adler32;
use std::ops::Range;

/// Where and how a file's bytes are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    /// Absolute offset of the first stored byte
    pub data_pos: u64,
    /// Number of stored bytes
    pub stored_size: u64,
    /// Number of bytes after decoding
    pub file_size: u64,
    /// Block flags
    pub flags: BlockFlags,
    /// Encryption key of sector zero, if encrypted
    pub key: Option<u32>,
    /// Sector size of the archive
    pub sector_size: usize,
}

impl FileLayout {
    fn is_compressed(&self) -> bool {
        self.flags.intersects(BlockFlags::IMPLODE | BlockFlags::COMPRESS)
    }

    fn is_imploded(&self) -> bool {
        self.flags.contains(BlockFlags::IMPLODE)
    }

    fn is_single_unit(&self) -> bool {
        self.flags.contains(BlockFlags::SINGLE_UNIT)
    }

    /// Number of sectors the decoded file spans
    pub fn sector_count(&self) -> usize {
        if self.file_size == 0 {
            0
        } else if self.is_single_unit() {
            1
        } else {
            self.file_size.div_ceil(self.sector_size as u64) as usize
        }
    }

    /// Sector holding a decoded offset, and the offset within that sector
    pub fn locate(&self, offset: u64) -> (usize, usize) {
        if self.is_single_unit() {
            return (0, offset as usize);
        }
        let sector_size = self.sector_size as u64;
        ((offset / sector_size) as usize, (offset % sector_size) as usize)
    }

    /// Decoded length of one sector
    fn sector_len(&self, index: usize) -> usize {
        if self.is_single_unit() {
            return self.file_size as usize;
        }
        let start = index as u64 * self.sector_size as u64;
        (self.file_size - start).min(self.sector_size as u64) as usize
    }

    fn sector_key(&self, index: usize) -> Option<u32> {
        self.key.map(|key| key.wrapping_add(index as u32))
    }
}

/// Decodes the sectors of one stored file
#[derive(Debug)]
pub struct SectorReader<'a> {
    reader: TaggedReader<'a>,
    layout: FileLayout,
    /// Stored byte ranges of each sector, relative to `data_pos`
    ranges: Vec<Range<u64>>,
    checksums: Option<Vec<u32>>,
}

impl<'a> SectorReader<'a> {
    /// Prepare a file for reading, loading its sector table if it has one
    pub(crate) fn new(
        reader: TaggedReader<'a>,
        layout: FileLayout,
        verify_checksums: bool,
    ) -> Result<Self> {
        let end = layout.data_pos.checked_add(layout.stored_size);
        if end.is_none_or(|end| end > reader.len()) {
            return Err(Error::truncated("file data"));
        }

        let count = layout.sector_count();
        let mut checksums = None;

        let ranges = if count == 0 {
            Vec::new()
        } else if layout.is_single_unit() {
            vec![0..layout.stored_size]
        } else if layout.is_compressed() {
            let (ranges, crc_range) = Self::load_offset_table(&reader, &layout, count)?;
            if verify_checksums {
                if let Some(crc_range) = crc_range {
                    checksums = Self::load_checksums(&reader, &layout, crc_range, count)?;
                }
            }
            ranges
        } else {
            (0..count)
                .map(|i| {
                    let start = i as u64 * layout.sector_size as u64;
                    start..start + layout.sector_len(i) as u64
                })
                .collect()
        };

        if let Some(last) = ranges.last() {
            if last.end > layout.stored_size {
                return Err(CodecError::BadSectorTable(format!(
                    "sector data ends at {} past stored size {}",
                    last.end, layout.stored_size
                ))
                .into());
            }
        }

        Ok(Self {
            reader,
            layout,
            ranges,
            checksums,
        })
    }

    fn load_offset_table(
        reader: &TaggedReader<'_>,
        layout: &FileLayout,
        count: usize,
    ) -> Result<(Vec<Range<u64>>, Option<Range<u64>>)> {
        let has_crc = layout.flags.contains(BlockFlags::SECTOR_CRC);
        let entries = count + 1 + usize::from(has_crc);
        let table_len = entries * 4;
        if table_len as u64 > layout.stored_size {
            return Err(CodecError::BadSectorTable(format!(
                "{entries} offsets do not fit in {} stored bytes",
                layout.stored_size
            ))
            .into());
        }

        let mut raw = reader.read_vec(layout.data_pos, table_len)?;
        if let Some(key) = layout.key {
            decrypt_bytes(&mut raw, key.wrapping_sub(1));
        }
        let offsets: Vec<u64> = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as u64)
            .collect();

        if offsets[0] < table_len as u64 || offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(CodecError::BadSectorTable(format!(
                "offsets are not increasing from the table end: {:?}",
                &offsets[..offsets.len().min(8)]
            ))
            .into());
        }

        let ranges = offsets[..=count]
            .windows(2)
            .map(|w| w[0]..w[1])
            .collect();
        let crc_range = has_crc.then(|| offsets[count]..offsets[count + 1]);

        log::trace!(
            "Sector table for {count} sectors at 0x{:X}, checksums: {has_crc}",
            layout.data_pos
        );
        Ok((ranges, crc_range))
    }

    fn load_checksums(
        reader: &TaggedReader<'_>,
        layout: &FileLayout,
        range: Range<u64>,
        count: usize,
    ) -> Result<Option<Vec<u32>>> {
        if range.is_empty() {
            return Ok(None);
        }
        if range.end > layout.stored_size {
            return Err(CodecError::BadSectorTable("checksum block past file end".into()).into());
        }

        let stored = reader.read_vec(
            layout.data_pos + range.start,
            (range.end - range.start) as usize,
        )?;
        let expected_len = count * 4;
        let raw = if stored.len() < expected_len {
            decompress_sector(&stored, expected_len, false)?
        } else {
            stored
        };
        if raw.len() < expected_len {
            return Err(CodecError::BadSectorTable(format!(
                "checksum block holds {} of {expected_len} bytes",
                raw.len()
            ))
            .into());
        }

        Ok(Some(
            raw.chunks_exact(4)
                .take(count)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ))
    }

    /// The file layout
    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Number of sectors
    pub fn sector_count(&self) -> usize {
        self.ranges.len()
    }

    /// Decode one sector
    pub fn read_sector(&self, index: usize) -> Result<Vec<u8>> {
        let range = self
            .ranges
            .get(index)
            .cloned()
            .ok_or_else(|| CodecError::BadSectorTable(format!("no sector {index}")))?;
        let expected = self.layout.sector_len(index);

        let mut stored = self.reader.read_vec(
            self.layout.data_pos + range.start,
            (range.end - range.start) as usize,
        )?;

        if let Some(key) = self.layout.sector_key(index) {
            decrypt_bytes(&mut stored, key);
        }

        if let Some(expected_sum) = self.checksums.as_ref().and_then(|sums| sums.get(index)) {
            verify_checksum(index, *expected_sum, &stored)?;
        }

        let decoded = if self.layout.is_compressed() {
            decompress_sector(&stored, expected, self.layout.is_imploded())?
        } else {
            stored
        };

        if decoded.len() != expected {
            return Err(Error::size_mismatch(expected as u64, decoded.len()));
        }

        log::trace!("Decoded sector {index}: {} -> {expected} bytes", range.end - range.start);
        Ok(decoded)
    }

    /// Decode the whole file
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(self.layout.file_size as usize);
        for index in 0..self.sector_count() {
            output.extend_from_slice(&self.read_sector(index)?);
        }

        if output.len() as u64 != self.layout.file_size {
            return Err(Error::size_mismatch(self.layout.file_size, output.len()));
        }
        Ok(output)
    }

    /// Decode the bytes in `offset..offset + len`, clamped to the file end
    ///
    /// Whole sectors covering the range are decoded.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let file_size = self.layout.file_size;
        let start = offset.min(file_size);
        let end = start.saturating_add(len as u64).min(file_size);
        if start == end {
            return Ok(Vec::new());
        }

        if self.layout.is_single_unit() {
            let all = self.read_all()?;
            return Ok(all[start as usize..end as usize].to_vec());
        }

        let sector_size = self.layout.sector_size as u64;
        let first = (start / sector_size) as usize;
        let last = ((end - 1) / sector_size) as usize;

        let mut output = Vec::with_capacity((end - start) as usize);
        for index in first..=last {
            let sector = self.read_sector(index)?;
            let sector_start = index as u64 * sector_size;
            let from = start.saturating_sub(sector_start) as usize;
            let to = ((end - sector_start) as usize).min(sector.len());
            output.extend_from_slice(&sector[from..to]);
        }
        Ok(output)
    }
}

fn verify_checksum(sector: usize, expected: u32, stored: &[u8]) -> Result<()> {
    if expected == 0 || expected == u32::MAX {
        log::trace!("Sector {sector} has no recorded checksum");
        return Ok(());
    }

    let actual = sector_checksum(stored);
    if actual != expected {
        return Err(CodecError::ChecksumMismatch {
            sector,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Checksum of a stored sector as recorded in the checksum block
pub fn sector_checksum(stored: &[u8]) -> u32 {
    let mut adler = Adler32::from_checksum(0);
    adler.write_slice(stored);
    adler.checksum()
}
