//! Stage-by-stage decompression

use super::algorithms;
use super::methods::{decompression_stages, CompressionMethod};
use crate::error::CodecError;
use crate::Result;

/// Decompress data whose method byte has already been stripped
///
/// Every stage of the chain is undone in order; `decompressed_size` bounds
/// the output of each stage.
pub fn decompress(data: &[u8], method: u8, decompressed_size: usize) -> Result<Vec<u8>> {
    let stages = decompression_stages(method)?;

    log::trace!(
        "Decompressing {} bytes to {} bytes with method 0x{:02X} ({} stages)",
        data.len(),
        decompressed_size,
        method,
        stages.len()
    );

    let mut buffer = data.to_vec();
    for stage in stages {
        buffer = run_stage(stage, &buffer, decompressed_size)?;
    }
    Ok(buffer)
}

fn run_stage(stage: CompressionMethod, data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let output = match stage {
        CompressionMethod::Zlib => algorithms::zlib::decompress(data, expected),
        CompressionMethod::BZip2 => algorithms::bzip2::decompress(data, expected),
        CompressionMethod::Lzma => algorithms::lzma::decompress(data, expected),
        CompressionMethod::PKWare => algorithms::pkware::decompress(data, expected),
        CompressionMethod::Sparse => algorithms::sparse::decompress(data, expected),
        CompressionMethod::AdpcmMono => algorithms::adpcm::decompress(data, expected, 1),
        CompressionMethod::AdpcmStereo => algorithms::adpcm::decompress(data, expected, 2),
        CompressionMethod::Huffman => Err(CodecError::Unsupported {
            method: stage.name(),
        }),
    }?;
    Ok(output)
}

/// Decode one stored sector
///
/// A sector whose stored length equals `expected` is raw. Imploded files
/// carry PKWARE data without a method byte; everything else starts with the
/// method mask.
pub fn decompress_sector(stored: &[u8], expected: usize, imploded: bool) -> Result<Vec<u8>> {
    if stored.len() == expected {
        return Ok(stored.to_vec());
    }
    if imploded {
        return Ok(algorithms::pkware::decompress(stored, expected)?);
    }

    let (&method, payload) = stored
        .split_first()
        .ok_or_else(|| CodecError::Decompress {
            method: "sector",
            message: "empty sector".to_string(),
        })?;
    decompress(payload, method, expected)
}
