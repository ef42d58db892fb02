//! Streaming access to a single archived file

use crate::sector::SectorReader;
use std::io::{self, Read, Seek, SeekFrom};

/// A file opened for reading
///
/// Sectors are decoded on demand; the most recently decoded sector is kept
/// so sequential small reads do not decode it again.
#[derive(Debug)]
pub struct MpqFile<'a> {
    sectors: SectorReader<'a>,
    position: u64,
    cached: Option<(usize, Vec<u8>)>,
}

impl<'a> MpqFile<'a> {
    pub(crate) fn new(sectors: SectorReader<'a>) -> Self {
        Self {
            sectors,
            position: 0,
            cached: None,
        }
    }

    /// Decoded size of the file
    pub fn size(&self) -> u64 {
        self.sectors.layout().file_size
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.position
    }

    fn sector(&mut self, index: usize) -> io::Result<&[u8]> {
        if self.cached.as_ref().is_none_or(|(cached, _)| *cached != index) {
            let data = self
                .sectors
                .read_sector(index)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.cached = Some((index, data));
        }
        Ok(self.cached.as_ref().map_or(&[][..], |(_, data)| data.as_slice()))
    }
}

impl Read for MpqFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.size() {
            return Ok(0);
        }

        let (index, offset) = self.sectors.layout().locate(self.position);
        let sector = self.sector(index)?;
        let available = sector.len().saturating_sub(offset);
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&sector[offset..offset + count]);

        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for MpqFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.size().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            )),
        }
    }
}
