//! Byte sources backing an open archive
//!
//! Every source supports positioned reads through a shared reference so one
//! archive can serve concurrent lookups. Sources built on a single seekable
//! stream serialise seek and read behind a mutex.

use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Positioned, read-only access to archive bytes
pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Total length in bytes
    fn len(&self) -> u64;

    /// Read exactly `buf.len()` bytes starting at `offset`
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Check if the source is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `offset` into a new buffer
    fn read_vec(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

fn check_range(total: u64, offset: u64, len: usize) -> io::Result<usize> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= total => Ok(offset as usize),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("read of {len} bytes at {offset} exceeds source length {total}"),
        )),
    }
}

/// Reads from a source, tagging failures with the layer and offset
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaggedReader<'a> {
    source: &'a dyn ByteSource,
    layer: &'a str,
}

impl<'a> TaggedReader<'a> {
    pub(crate) fn new(source: &'a dyn ByteSource, layer: &'a str) -> Self {
        Self { source, layer }
    }

    pub(crate) fn len(&self) -> u64 {
        self.source.len()
    }

    pub(crate) fn read_vec(&self, offset: u64, len: usize) -> crate::Result<Vec<u8>> {
        self.source
            .read_vec(offset, len)
            .map_err(|source| crate::Error::Source {
                layer: self.layer.to_string(),
                offset,
                source,
            })
    }
}

/// In-memory archive bytes
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap a buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = check_range(self.len(), offset, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

/// A file read through one seekable handle
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    /// Open a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    /// Wrap an already opened file
    pub fn from_file(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        check_range(self.len, offset, buf.len())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// A memory-mapped file
#[cfg(feature = "mmap")]
#[cfg_attr(docsrs, doc(cfg(feature = "mmap")))]
#[derive(Debug)]
pub struct MmapSource {
    map: memmap2::Mmap,
}

#[cfg(feature = "mmap")]
impl MmapSource {
    /// Map a file into memory
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only; archives are never modified while open.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self { map })
    }
}

#[cfg(feature = "mmap")]
impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = check_range(self.len(), offset, buf.len())?;
        buf.copy_from_slice(&self.map[start..start + buf.len()]);
        Ok(())
    }
}
