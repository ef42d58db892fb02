//! # mpqlayer - MPQ Archive Engine
//!
//! A safe Rust reader for the MPQ (Mo'PaQ) archive format used by Blizzard
//! Entertainment games, with support for stacked patch archives.
//!
//! A single logical file space is assembled from one base archive plus any
//! number of prioritised patch archives. Higher layers may add files, replace
//! them whole, delete them, or carry incremental `PTCH` fragments that are
//! replayed over the content found in lower layers.
//!
//! ## Features
//!
//! - MPQ format versions 1-4 (classic hash and block tables)
//! - Encrypted tables and files, including the fix-key variant
//! - Sector codecs: zlib, bzip2, LZMA, PKWARE DCL, sparse and ADPCM
//! - Optional per-sector Adler-32 checksums
//! - Patch chains with `COPY` and `BSD0` fragment replay
//! - Memory, file and memory-mapped byte sources
//!
//! ## Example
//!
//! ```no_run
//! use mpqlayer::{Archive, PatchChain};
//!
//! # fn main() -> Result<(), mpqlayer::Error> {
//! let base = Archive::open("common.MPQ")?;
//! let mut chain = PatchChain::new(base);
//! chain.add_patch(Archive::open("patch.MPQ")?, 100);
//!
//! if chain.has_file("Interface\\FrameXML\\UIParent.lua") {
//!     let data = chain.read_file("Interface\\FrameXML\\UIParent.lua")?;
//!     println!("{} bytes", data.len());
//! }
//!
//! for name in chain.enumerate("*.lua")? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod archive;
pub mod chain;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod file;
pub mod hash;
pub mod header;
pub mod io;
pub mod listfile;
pub mod patch;
pub mod sector;
pub mod tables;

// Re-export commonly used types
pub use archive::{Archive, ArchiveInfo, FileInfo, OpenOptions};
pub use chain::{ChainInfo, ChainOptions, PatchChain, Resolved};
pub use error::{CodecError, Error, FormatError, PatchError, Result};
pub use file::MpqFile;
pub use header::FormatVersion;
pub use io::ByteSource;
pub use listfile::FileNames;
pub use tables::{BlockEntry, BlockFlags, HashEntry};

/// MPQ signature constants
pub mod signatures {
    /// Standard MPQ archive signature ('MPQ\x1A')
    pub const MPQ_ARCHIVE: u32 = 0x1A51504D;

    /// MPQ user data signature ('MPQ\x1B')
    pub const MPQ_USERDATA: u32 = 0x1B51504D;

    /// Incremental patch header ('PTCH')
    pub const PTCH: u32 = 0x48435450;

    /// Patch MD5 block ('MD5_')
    pub const PATCH_MD5: u32 = 0x5F35444D;

    /// Patch transform block ('XFRM')
    pub const PATCH_XFRM: u32 = 0x4D524658;

    /// Binary diff stream ('BSDIFF40')
    pub const BSDIFF40: u64 = 0x3034464649445342;
}

/// Well-known internal file names
pub mod special_files {
    /// File name list
    pub const LISTFILE: &str = "(listfile)";
    /// Extended file attributes
    pub const ATTRIBUTES: &str = "(attributes)";
}

/// Block size calculation
#[inline]
pub fn calculate_sector_size(block_size_shift: u16) -> usize {
    512 << block_size_shift
}

/// Check if a value is a power of two
#[inline]
pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && (value & (value - 1)) == 0
}
