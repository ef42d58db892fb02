//! Compression and decompression algorithms for MPQ sectors
//!
//! A compressed sector starts with a method byte. Each set bit selects one
//! codec; several bits form a chain that is undone in a fixed order (see
//! [`decompression_stages`]). LZMA uses the exclusive value `0x12`.

mod algorithms;
mod compress;
mod decompress;
mod methods;

pub use compress::{compress, compress_sector};
pub use decompress::{decompress, decompress_sector};
pub use methods::{decompression_stages, CompressionMethod};

/// Compression method flags
pub mod flags {
    /// Huffman coding (WAVE files)
    pub const HUFFMAN: u8 = 0x01;
    /// Deflate with zlib framing
    pub const ZLIB: u8 = 0x02;
    /// PKWARE Data Compression Library
    pub const PKWARE: u8 = 0x08;
    /// bzip2
    pub const BZIP2: u8 = 0x10;
    /// Zero-run sparse encoding
    pub const SPARSE: u8 = 0x20;
    /// IMA ADPCM, one channel
    pub const ADPCM_MONO: u8 = 0x40;
    /// IMA ADPCM, two channels
    pub const ADPCM_STEREO: u8 = 0x80;
    /// LZMA; never combined with other bits
    pub const LZMA: u8 = 0x12;
}
