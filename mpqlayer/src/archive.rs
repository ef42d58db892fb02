//! MPQ archive handling
//!
//! An [`Archive`] is one opened layer: its header, decrypted hash and block
//! tables, and the byte source they were read from. Lookups never touch the
//! source; extraction reads and decodes only the sectors it needs.

use crate::crypto::file_key;
use crate::error::FormatError;
use crate::file::MpqFile;
use crate::hash::NameHashes;
use crate::header::{self, ArchiveHeader, FormatVersion, UserDataHeader};
use crate::io::{ByteSource, MemorySource, TaggedReader};
use crate::listfile::{self, FileNames, NameLookup};
use crate::patch::{PatchFile, PatchInfo};
use crate::sector::{FileLayout, SectorReader};
use crate::tables::{
    read_encrypted_table, table_key, BlockEntry, BlockFlags, BlockTable, HashEntry, HashTable,
    HiBlockTable,
};
use crate::{special_files, Error, Result};
use bytes::Bytes;
use std::path::Path;

/// Options for opening MPQ archives
#[derive(Debug, Clone)]
pub struct OpenOptions {
    locale: u16,
    verify_checksums: bool,
    name: Option<String>,
}

impl OpenOptions {
    /// Create new default options
    pub fn new() -> Self {
        Self {
            locale: 0,
            verify_checksums: true,
            name: None,
        }
    }

    /// Preferred locale for lookups (0 is neutral)
    pub fn locale(mut self, locale: u16) -> Self {
        self.locale = locale;
        self
    }

    /// Whether sector checksums are verified when present
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Name used in error messages and logs
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Open an archive file
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Archive> {
        let path = path.as_ref();
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| path.display().to_string());

        #[cfg(feature = "mmap")]
        let source: Box<dyn ByteSource> = Box::new(crate::io::MmapSource::open(path)?);
        #[cfg(not(feature = "mmap"))]
        let source: Box<dyn ByteSource> = Box::new(crate::io::FileSource::open(path)?);

        Archive::load(source, name, self)
    }

    /// Open an archive held in memory
    pub fn open_bytes(self, data: impl Into<Bytes>) -> Result<Archive> {
        let name = self.name.clone().unwrap_or_else(|| "<memory>".to_string());
        Archive::load(Box::new(MemorySource::new(data)), name, self)
    }

    /// Open an archive from any byte source
    pub fn open_source(self, source: Box<dyn ByteSource>) -> Result<Archive> {
        let name = self.name.clone().unwrap_or_else(|| "<source>".to_string());
        Archive::load(source, name, self)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of an opened archive
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveInfo {
    /// Layer name
    pub name: String,
    /// Offset of the archive header within the source
    pub header_offset: u64,
    /// Declared archive size
    pub archive_size: u64,
    /// Header format version
    pub format_version: FormatVersion,
    /// Sector size in bytes
    pub sector_size: usize,
    /// Hash table slots
    pub hash_table_size: u32,
    /// Block table entries
    pub block_table_size: u32,
    /// Hash entries pointing at existing blocks
    pub file_count: usize,
}

/// A resolved hash and block entry pair
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    /// Name the entry was looked up by
    pub name: String,
    /// Hash table slot
    pub hash_index: usize,
    /// Block table index
    pub block_index: usize,
    /// Offset of the stored data relative to the archive start
    pub file_pos: u64,
    /// Stored size
    pub compressed_size: u64,
    /// Uncompressed size
    pub file_size: u64,
    /// Block flags
    pub flags: BlockFlags,
    /// Locale of the matching hash entry
    pub locale: u16,
}

impl FileInfo {
    fn new(name: &str, hash_index: usize, hash: &HashEntry, block: &BlockEntry) -> Self {
        Self {
            name: name.to_string(),
            hash_index,
            block_index: hash.block_index as usize,
            file_pos: block.file_pos,
            compressed_size: block.compressed_size as u64,
            file_size: block.file_size as u64,
            flags: block.flags,
            locale: hash.locale,
        }
    }

    /// Check if the file is compressed
    pub fn is_compressed(&self) -> bool {
        self.flags.intersects(BlockFlags::IMPLODE | BlockFlags::COMPRESS)
    }

    /// Check if the file is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(BlockFlags::ENCRYPTED)
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

/// An MPQ archive
#[derive(Debug)]
pub struct Archive {
    name: String,
    source: Box<dyn ByteSource>,
    archive_offset: u64,
    user_data: Option<UserDataHeader>,
    header: ArchiveHeader,
    hash_table: HashTable,
    block_table: BlockTable,
    locale: u16,
    verify_checksums: bool,
}

impl Archive {
    /// Open an existing MPQ archive with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Open an archive held in memory with default options
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        OpenOptions::new().open_bytes(data)
    }

    fn load(source: Box<dyn ByteSource>, name: String, options: OpenOptions) -> Result<Self> {
        let reader = TaggedReader::new(&*source, &name);
        let location = header::find_header(&reader)?;
        let header = location.header;
        let base = location.archive_offset;

        let hash_data = read_encrypted_table(
            &reader,
            "hash table",
            base + header.hash_table_pos,
            header.hash_table_size,
            table_key("(hash table)"),
        )?;
        let hash_table = HashTable::from_bytes(&hash_data, header.hash_table_size)?;

        let block_data = read_encrypted_table(
            &reader,
            "block table",
            base + header.block_table_pos,
            header.block_table_size,
            table_key("(block table)"),
        )?;
        let mut block_table = BlockTable::from_bytes(&block_data, header.block_table_size)?;

        if header.hi_block_table_pos != 0 {
            let pos = base + header.hi_block_table_pos;
            let len = header.block_table_size as usize * 2;
            if pos.saturating_add(len as u64) > reader.len() {
                return Err(FormatError::TableOutOfBounds {
                    table: "hi-block table",
                }
                .into());
            }
            let hi = HiBlockTable::from_bytes(&reader.read_vec(pos, len)?, header.block_table_size)?;
            block_table.apply_hi_block_table(&hi);
        }

        log::debug!(
            "Opened {name}: {:?}, {} hash slots, {} blocks, sector size {}",
            header.format_version,
            hash_table.size(),
            block_table.size(),
            header.sector_size()
        );

        Ok(Self {
            name,
            source,
            archive_offset: base,
            user_data: location.user_data,
            header,
            hash_table,
            block_table,
            locale: options.locale,
            verify_checksums: options.verify_checksums,
        })
    }

    /// Layer name used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the archive header
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Get the user data header if present
    pub fn user_data(&self) -> Option<&UserDataHeader> {
        self.user_data.as_ref()
    }

    /// Offset of the archive within its source
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    /// The decrypted hash table
    pub fn hash_table(&self) -> &HashTable {
        &self.hash_table
    }

    /// The decrypted block table
    pub fn block_table(&self) -> &BlockTable {
        &self.block_table
    }

    /// Locale preferred by lookups
    pub fn locale(&self) -> u16 {
        self.locale
    }

    /// Summary of the archive
    pub fn archive_info(&self) -> ArchiveInfo {
        let file_count = self
            .hash_table
            .entries()
            .iter()
            .filter(|entry| entry.is_valid() && self.is_live_block(entry.block_index))
            .count();

        ArchiveInfo {
            name: self.name.clone(),
            header_offset: self.archive_offset,
            archive_size: self.header.archive_size,
            format_version: self.header.format_version,
            sector_size: self.header.sector_size(),
            hash_table_size: self.header.hash_table_size,
            block_table_size: self.header.block_table_size,
            file_count,
        }
    }

    fn is_live_block(&self, block_index: u32) -> bool {
        self.block_table
            .get(block_index as usize)
            .is_some_and(BlockEntry::exists)
    }

    /// Look a file up under an explicit locale
    pub fn find_file_locale(&self, name: &str, locale: u16) -> Option<FileInfo> {
        let hashes = NameHashes::new(name);
        let (hash_index, hash) = self
            .hash_table
            .find_file(&hashes, locale, |block| self.is_live_block(block))?;
        let block = self.block_table.get(hash.block_index as usize)?;
        Some(FileInfo::new(name, hash_index, hash, block))
    }

    /// Look a file up under the archive's locale
    pub fn find_file(&self, name: &str) -> Option<FileInfo> {
        self.find_file_locale(name, self.locale)
    }

    /// Check if the archive holds a file that is not deleted
    ///
    /// Patch entries count; use a patch chain to ask whether content can
    /// actually be produced.
    pub fn exists(&self, name: &str) -> bool {
        self.find_file(name)
            .is_some_and(|info| !info.is_delete_marker())
    }

    /// Check if the archive has any entry for a name, delete markers included
    pub fn has_entry(&self, name: &str) -> bool {
        self.find_file(name).is_some()
    }

    /// The block entry a file resolves to
    pub fn block_entry(&self, name: &str) -> Option<&BlockEntry> {
        let hashes = NameHashes::new(name);
        let (_, hash) = self
            .hash_table
            .find_file(&hashes, self.locale, |block| self.is_live_block(block))?;
        self.block_table.get(hash.block_index as usize)
    }

    /// Information about a file
    pub fn file_info(&self, name: &str) -> Result<FileInfo> {
        self.find_file(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    fn reader(&self) -> TaggedReader<'_> {
        TaggedReader::new(&*self.source, &self.name)
    }

    /// Where and how an entry's content is stored
    ///
    /// Patch entries begin with an info record; their sector layout starts
    /// after it and decodes to the record's data size.
    pub(crate) fn layout(&self, info: &FileInfo) -> Result<FileLayout> {
        let mut data_pos = self.archive_offset + info.file_pos;
        let mut stored_size = info.compressed_size;
        let mut file_size = info.file_size;

        if info.is_patch_file() {
            if stored_size < PatchInfo::SIZE as u64 {
                return Err(Error::truncated("patch info"));
            }
            let raw = self.reader().read_vec(data_pos, PatchInfo::SIZE)?;
            let patch_info = PatchInfo::parse(&raw)?;
            let skip = patch_info.length as u64;
            stored_size = stored_size
                .checked_sub(skip)
                .ok_or(Error::truncated("patch data"))?;
            data_pos += skip;
            file_size = patch_info.data_size as u64;
        }

        let key = if info.is_encrypted() {
            Some(file_key(
                &info.name,
                info.file_pos,
                info.file_size as u32,
                info.flags.contains(BlockFlags::FIX_KEY),
            )?)
        } else {
            None
        };

        Ok(FileLayout {
            data_pos,
            stored_size,
            file_size,
            flags: info.flags,
            key,
            sector_size: self.header.sector_size(),
        })
    }

    pub(crate) fn sectors(&self, info: &FileInfo) -> Result<SectorReader<'_>> {
        if info.is_delete_marker() {
            return Err(Error::FileNotFound(info.name.clone()));
        }
        let layout = self.layout(info)?;
        SectorReader::new(self.reader(), layout, self.verify_checksums)
    }

    /// Decode an entry found by a lookup
    pub(crate) fn read_entry(&self, info: &FileInfo) -> Result<Vec<u8>> {
        let data = self.sectors(info)?.read_all()?;
        log::trace!("Read {} ({} bytes) from {}", info.name, data.len(), self.name);
        Ok(data)
    }

    /// Parse the fragment stored in a patch entry
    pub(crate) fn read_patch_entry(&self, info: &FileInfo) -> Result<PatchFile> {
        PatchFile::parse(&self.read_entry(info)?)
    }

    /// Read a whole file
    ///
    /// For a patch entry this is the stored `PTCH` fragment, not patched
    /// content. Delete markers read as missing.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.read_entry(&self.file_info(name)?)
    }

    /// Read `len` bytes at `offset`, clamped to the end of the file
    pub fn read_range(&self, name: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.sectors(&self.file_info(name)?)?.read_range(offset, len)
    }

    /// The stored bytes of a file, without decryption or decompression
    pub fn read_raw(&self, name: &str) -> Result<Vec<u8>> {
        let info = self.file_info(name)?;
        let pos = self.archive_offset + info.file_pos;
        if pos.saturating_add(info.compressed_size) > self.source.len() {
            return Err(Error::truncated("file data"));
        }
        self.reader().read_vec(pos, info.compressed_size as usize)
    }

    /// Parse the fragment of a patch entry
    pub fn read_patch(&self, name: &str) -> Result<PatchFile> {
        let info = self.file_info(name)?;
        if !info.is_patch_file() {
            return Err(Error::FileNotFound(format!("{name} (patch)")));
        }
        self.read_patch_entry(&info)
    }

    /// Open a file for streaming reads
    pub fn open_file(&self, name: &str) -> Result<MpqFile<'_>> {
        Ok(MpqFile::new(self.sectors(&self.file_info(name)?)?))
    }

    /// Names recorded in the archive's listfile
    pub fn list(&self) -> Result<Vec<String>> {
        let info = self
            .find_file(special_files::LISTFILE)
            .filter(|info| !info.is_patch_file() && !info.is_delete_marker())
            .ok_or_else(|| Error::FileNotFound(special_files::LISTFILE.to_string()))?;
        Ok(listfile::parse_listfile(&self.read_entry(&info)?))
    }

    /// Lazily enumerate listed names matching a wildcard mask
    ///
    /// Only names that resolve to an entry are yielded.
    pub fn enumerate(&self, mask: &str) -> Result<FileNames<'_>> {
        Ok(FileNames::new(self, self.list()?, mask))
    }
}

impl NameLookup for Archive {
    fn contains(&self, name: &str) -> bool {
        self.exists(name)
    }
}
