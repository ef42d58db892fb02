//! Fixture archive writer shared by the integration tests
//!
//! Emits version 1 archives with encrypted hash and block tables. File
//! content is laid out the way the reader expects it: sector offset tables,
//! per-sector encryption, optional checksum blocks, patch info records.

#![allow(dead_code)]

use md5::{Digest, Md5};
use mpqlayer::compression::{compress, compress_sector, flags};
use mpqlayer::crypto::{encrypt_bytes, file_key};
use mpqlayer::hash::{hash_string, hash_type, NameHashes};
use mpqlayer::sector::sector_checksum;
use mpqlayer::{signatures, special_files, BlockFlags};

/// How one file is stored
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: Option<u8>,
    pub implode: bool,
    pub encrypted: bool,
    pub fix_key: bool,
    pub single_unit: bool,
    pub sector_crc: bool,
    pub patch: bool,
    pub delete_marker: bool,
    pub locale: u16,
}

impl FileSpec {
    /// A zlib-compressed sectored file
    pub fn new(name: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
            compression: Some(flags::ZLIB),
            implode: false,
            encrypted: false,
            fix_key: false,
            single_unit: false,
            sector_crc: false,
            patch: false,
            delete_marker: false,
            locale: 0,
        }
    }

    pub fn stored(mut self) -> Self {
        self.compression = None;
        self
    }

    pub fn compression(mut self, method: u8) -> Self {
        self.compression = Some(method);
        self
    }

    pub fn imploded(mut self) -> Self {
        self.compression = None;
        self.implode = true;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn fix_key(mut self) -> Self {
        self.encrypted = true;
        self.fix_key = true;
        self
    }

    pub fn single_unit(mut self) -> Self {
        self.single_unit = true;
        self
    }

    pub fn sector_crc(mut self) -> Self {
        self.sector_crc = true;
        self
    }

    pub fn locale(mut self, locale: u16) -> Self {
        self.locale = locale;
        self
    }

    /// A patch entry holding a `PTCH` fragment
    pub fn patch(name: &str, fragment: Vec<u8>) -> Self {
        let mut spec = Self::new(name, fragment);
        spec.patch = true;
        spec
    }

    /// A tombstone for `name`
    pub fn delete_marker(name: &str) -> Self {
        let mut spec = Self::new(name, Vec::new());
        spec.compression = None;
        spec.delete_marker = true;
        spec
    }

    fn flags(&self) -> BlockFlags {
        let mut flags = BlockFlags::EXISTS;
        if self.delete_marker {
            return flags | BlockFlags::DELETE_MARKER;
        }
        if self.compression.is_some() {
            flags |= BlockFlags::COMPRESS;
        }
        if self.implode {
            flags |= BlockFlags::IMPLODE;
        }
        if self.encrypted {
            flags |= BlockFlags::ENCRYPTED;
        }
        if self.fix_key {
            flags |= BlockFlags::FIX_KEY;
        }
        if self.single_unit {
            flags |= BlockFlags::SINGLE_UNIT;
        }
        if self.sector_crc {
            flags |= BlockFlags::SECTOR_CRC;
        }
        if self.patch {
            flags |= BlockFlags::PATCH_FILE;
        }
        flags
    }

    fn is_compressed(&self) -> bool {
        self.compression.is_some() || self.implode
    }

    /// Encode one unit of content: method byte plus payload, or raw
    fn encode_unit(&self, chunk: &[u8]) -> Vec<u8> {
        if self.implode {
            let packed = compress(chunk, flags::PKWARE).unwrap();
            if packed.len() < chunk.len() {
                packed
            } else {
                chunk.to_vec()
            }
        } else if let Some(method) = self.compression {
            compress_sector(chunk, method).unwrap()
        } else {
            chunk.to_vec()
        }
    }

    /// Encode content into its stored form
    fn encode(&self, content: &[u8], sector_size: usize, key: Option<u32>) -> Vec<u8> {
        if content.is_empty() {
            return Vec::new();
        }

        if self.single_unit {
            let mut stored = self.encode_unit(content);
            if let Some(key) = key {
                encrypt_bytes(&mut stored, key);
            }
            return stored;
        }

        let plain: Vec<Vec<u8>> = content
            .chunks(sector_size)
            .map(|chunk| self.encode_unit(chunk))
            .collect();
        let checksums: Vec<u8> = plain
            .iter()
            .flat_map(|sector| sector_checksum(sector).to_le_bytes())
            .collect();
        let sectors: Vec<Vec<u8>> = plain
            .into_iter()
            .enumerate()
            .map(|(i, mut sector)| {
                if let Some(key) = key {
                    encrypt_bytes(&mut sector, key.wrapping_add(i as u32));
                }
                sector
            })
            .collect();

        if !self.is_compressed() {
            return sectors.concat();
        }

        let with_crc = self.sector_crc;
        let entries = sectors.len() + 1 + usize::from(with_crc);
        let mut offsets = vec![(entries * 4) as u32];
        for sector in &sectors {
            offsets.push(offsets[offsets.len() - 1] + sector.len() as u32);
        }
        if with_crc {
            offsets.push(offsets[offsets.len() - 1] + checksums.len() as u32);
        }

        let mut out: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
        if let Some(key) = key {
            encrypt_bytes(&mut out, key.wrapping_sub(1));
        }
        for sector in &sectors {
            out.extend_from_slice(sector);
        }
        if with_crc {
            out.extend_from_slice(&checksums);
        }
        out
    }
}

/// Builds a complete archive in memory
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    sector_shift: u16,
    hash_table_size: u32,
    files: Vec<FileSpec>,
    listfile: bool,
    user_data: bool,
}

/// Offset of the archive behind a user data header
pub const USER_DATA_ARCHIVE_OFFSET: usize = 0x200;

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            sector_shift: 3,
            hash_table_size: 16,
            files: Vec::new(),
            listfile: true,
            user_data: false,
        }
    }

    pub fn sector_shift(mut self, shift: u16) -> Self {
        self.sector_shift = shift;
        self
    }

    pub fn hash_table_size(mut self, size: u32) -> Self {
        self.hash_table_size = size;
        self
    }

    pub fn without_listfile(mut self) -> Self {
        self.listfile = false;
        self
    }

    pub fn with_user_data(mut self) -> Self {
        self.user_data = true;
        self
    }

    pub fn file(mut self, spec: FileSpec) -> Self {
        self.files.push(spec);
        self
    }

    pub fn add(self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.file(FileSpec::new(name, data))
    }

    pub fn build(&self) -> Vec<u8> {
        let sector_size = 512usize << self.sector_shift;
        let mut files = self.files.clone();
        if self.listfile {
            let mut names: Vec<&str> = files
                .iter()
                .filter(|f| !f.delete_marker)
                .map(|f| f.name.as_str())
                .collect();
            names.dedup();
            let listing = names.join("\r\n").into_bytes();
            files.push(FileSpec::new(special_files::LISTFILE, listing));
        }

        // file data directly after the header
        let mut body = Vec::new();
        let mut blocks = Vec::new();
        for spec in &files {
            let file_pos = (32 + body.len()) as u32;
            if spec.delete_marker {
                blocks.push((file_pos, 0u32, 0u32, spec.flags().bits()));
                continue;
            }

            let key = spec.encrypted.then(|| {
                file_key(&spec.name, file_pos as u64, spec.data.len() as u32, spec.fix_key)
                    .unwrap()
            });
            let mut stored = spec.encode(&spec.data, sector_size, key);

            if spec.patch {
                let mut record = Vec::new();
                record.extend_from_slice(&28u32.to_le_bytes());
                record.extend_from_slice(&0x8000_0000u32.to_le_bytes());
                record.extend_from_slice(&(spec.data.len() as u32).to_le_bytes());
                record.extend_from_slice(&md5(&spec.data));
                record.extend_from_slice(&stored);
                stored = record;
            }

            blocks.push((
                file_pos,
                stored.len() as u32,
                spec.data.len() as u32,
                spec.flags().bits(),
            ));
            body.extend_from_slice(&stored);
        }

        let hash_pos = 32 + body.len() as u32;
        let block_pos = hash_pos + self.hash_table_size * 16;
        let archive_size = block_pos + blocks.len() as u32 * 16;

        let mut hash_table = vec![[0xFFFF_FFFFu32; 4]; self.hash_table_size as usize];
        let mask = self.hash_table_size as usize - 1;
        for (block_index, spec) in files.iter().enumerate() {
            let hashes = NameHashes::new(&spec.name);
            let mut slot = hashes.offset as usize & mask;
            while hash_table[slot][3] != 0xFFFF_FFFF {
                slot = (slot + 1) & mask;
            }
            hash_table[slot] = [
                hashes.name_a,
                hashes.name_b,
                spec.locale as u32,
                block_index as u32,
            ];
        }

        let mut hash_bytes: Vec<u8> = hash_table
            .iter()
            .flat_map(|entry| entry.iter().flat_map(|word| word.to_le_bytes()))
            .collect();
        encrypt_bytes(
            &mut hash_bytes,
            hash_string("(hash table)", hash_type::FILE_KEY),
        );

        let mut block_bytes: Vec<u8> = blocks
            .iter()
            .flat_map(|&(pos, csize, size, flags)| {
                [pos, csize, size, flags]
                    .into_iter()
                    .flat_map(|word| word.to_le_bytes())
            })
            .collect();
        encrypt_bytes(
            &mut block_bytes,
            hash_string("(block table)", hash_type::FILE_KEY),
        );

        let mut archive = Vec::new();
        archive.extend_from_slice(&signatures::MPQ_ARCHIVE.to_le_bytes());
        archive.extend_from_slice(&32u32.to_le_bytes());
        archive.extend_from_slice(&archive_size.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&self.sector_shift.to_le_bytes());
        archive.extend_from_slice(&hash_pos.to_le_bytes());
        archive.extend_from_slice(&block_pos.to_le_bytes());
        archive.extend_from_slice(&self.hash_table_size.to_le_bytes());
        archive.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
        archive.extend_from_slice(&body);
        archive.extend_from_slice(&hash_bytes);
        archive.extend_from_slice(&block_bytes);

        if !self.user_data {
            return archive;
        }

        let mut prefixed = Vec::new();
        prefixed.extend_from_slice(&signatures::MPQ_USERDATA.to_le_bytes());
        prefixed.extend_from_slice(&0x100u32.to_le_bytes());
        prefixed.extend_from_slice(&(USER_DATA_ARCHIVE_OFFSET as u32).to_le_bytes());
        prefixed.extend_from_slice(&16u32.to_le_bytes());
        prefixed.resize(USER_DATA_ARCHIVE_OFFSET, 0xAB);
        prefixed.extend_from_slice(&archive);
        prefixed
    }
}

/// Location of a stored file's block entry data, for corruption tests
pub fn block_of(archive: &[u8], name: &str) -> (usize, usize) {
    let opened = mpqlayer::Archive::from_bytes(archive.to_vec()).unwrap();
    let info = opened.file_info(name).unwrap();
    let start = opened.archive_offset() as usize + info.file_pos as usize;
    (start, start + info.compressed_size as usize)
}

pub fn md5(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

/// Deterministic, compressible sample content
pub fn sample(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| match (i / 64) % 3 {
            0 => 0,
            1 => b'a' + ((i + seed as usize) % 26) as u8,
            _ => seed.wrapping_add((i % 11) as u8),
        })
        .collect()
}

fn fragment(kind: &[u8; 4], before: &[u8], after: &[u8], stored: &[u8], payload_len: usize) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&signatures::PTCH.to_le_bytes());
    data.extend_from_slice(&((68 + payload_len) as u32).to_le_bytes());
    data.extend_from_slice(&(before.len() as u32).to_le_bytes());
    data.extend_from_slice(&(after.len() as u32).to_le_bytes());
    data.extend_from_slice(&signatures::PATCH_MD5.to_le_bytes());
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&md5(before));
    data.extend_from_slice(&md5(after));
    data.extend_from_slice(&signatures::PATCH_XFRM.to_le_bytes());
    data.extend_from_slice(&(12 + stored.len() as u32).to_le_bytes());
    data.extend_from_slice(kind);
    data.extend_from_slice(stored);
    data
}

/// A `COPY` fragment replacing `before` with `after`
pub fn copy_patch(before: &[u8], after: &[u8]) -> Vec<u8> {
    fragment(b"COPY", before, after, after, after.len())
}

fn rle_pack(data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_le_bytes().to_vec();
    let mut pos = 0;
    while pos < data.len() {
        let zeros = data[pos..].iter().take(0x80).take_while(|&&b| b == 0).count();
        if zeros > 0 {
            out.push((zeros - 1) as u8);
            pos += zeros;
            continue;
        }
        let literals = data[pos..].iter().take(0x80).take_while(|&&b| b != 0).count();
        out.push(0x80 | (literals - 1) as u8);
        out.extend_from_slice(&data[pos..pos + literals]);
        pos += literals;
    }
    out
}

/// A `BSDIFF40` stream: one add over the common prefix, the rest inserted
pub fn bsdiff_stream(before: &[u8], after: &[u8]) -> Vec<u8> {
    let common = before.len().min(after.len());
    let diff: Vec<u8> = (0..common)
        .map(|i| after[i].wrapping_sub(before[i]))
        .collect();
    let extra = &after[common..];

    let mut stream = Vec::new();
    stream.extend_from_slice(&signatures::BSDIFF40.to_le_bytes());
    stream.extend_from_slice(&12u64.to_le_bytes());
    stream.extend_from_slice(&(diff.len() as u64).to_le_bytes());
    stream.extend_from_slice(&(after.len() as u64).to_le_bytes());
    stream.extend_from_slice(&(common as u32).to_le_bytes());
    stream.extend_from_slice(&(extra.len() as u32).to_le_bytes());
    stream.extend_from_slice(&0u32.to_le_bytes());
    stream.extend_from_slice(&diff);
    stream.extend_from_slice(extra);
    stream
}

/// A `BSD0` fragment turning `before` into `after`
pub fn bsd0_patch(before: &[u8], after: &[u8]) -> Vec<u8> {
    let stream = bsdiff_stream(before, after);
    let packed = rle_pack(&stream);
    let stored = if packed.len() < stream.len() {
        packed
    } else {
        stream.clone()
    };
    fragment(b"BSD0", before, after, &stored, stream.len())
}

/// Install a test logger once
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
