//! Compression method identification

use super::flags;
use crate::error::CodecError;

/// A single codec stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Huffman coding
    Huffman,
    /// zlib/deflate
    Zlib,
    /// PKWARE DCL implode
    PKWare,
    /// bzip2
    BZip2,
    /// LZMA
    Lzma,
    /// Sparse zero-run encoding
    Sparse,
    /// ADPCM mono
    AdpcmMono,
    /// ADPCM stereo
    AdpcmStereo,
}

/// Stage order used when undoing a multi-codec chain
///
/// Compression applies the same stages in reverse.
const DECOMPRESSION_ORDER: [(u8, CompressionMethod); 7] = [
    (flags::BZIP2, CompressionMethod::BZip2),
    (flags::PKWARE, CompressionMethod::PKWare),
    (flags::ZLIB, CompressionMethod::Zlib),
    (flags::HUFFMAN, CompressionMethod::Huffman),
    (flags::ADPCM_STEREO, CompressionMethod::AdpcmStereo),
    (flags::ADPCM_MONO, CompressionMethod::AdpcmMono),
    (flags::SPARSE, CompressionMethod::Sparse),
];

impl CompressionMethod {
    /// Method name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            CompressionMethod::Huffman => "Huffman",
            CompressionMethod::Zlib => "zlib",
            CompressionMethod::PKWare => "PKWARE",
            CompressionMethod::BZip2 => "bzip2",
            CompressionMethod::Lzma => "LZMA",
            CompressionMethod::Sparse => "sparse",
            CompressionMethod::AdpcmMono => "ADPCM mono",
            CompressionMethod::AdpcmStereo => "ADPCM stereo",
        }
    }

    /// The flag bits of this method
    pub fn flag(self) -> u8 {
        match self {
            CompressionMethod::Huffman => flags::HUFFMAN,
            CompressionMethod::Zlib => flags::ZLIB,
            CompressionMethod::PKWare => flags::PKWARE,
            CompressionMethod::BZip2 => flags::BZIP2,
            CompressionMethod::Lzma => flags::LZMA,
            CompressionMethod::Sparse => flags::SPARSE,
            CompressionMethod::AdpcmMono => flags::ADPCM_MONO,
            CompressionMethod::AdpcmStereo => flags::ADPCM_STEREO,
        }
    }
}

/// Split a method byte into the ordered list of stages to undo
pub fn decompression_stages(mask: u8) -> Result<Vec<CompressionMethod>, CodecError> {
    if mask == flags::LZMA {
        return Ok(vec![CompressionMethod::Lzma]);
    }

    let known = DECOMPRESSION_ORDER
        .iter()
        .fold(0u8, |acc, (flag, _)| acc | flag);
    if mask == 0 || mask & !known != 0 {
        return Err(CodecError::UnknownMethod(mask));
    }

    Ok(DECOMPRESSION_ORDER
        .iter()
        .filter(|(flag, _)| mask & flag != 0)
        .map(|&(_, method)| method)
        .collect())
}
