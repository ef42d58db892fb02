//! Compression, used to build sectors

use super::algorithms;
use super::methods::{decompression_stages, CompressionMethod};
use crate::error::CodecError;
use crate::Result;

/// Compress data with every stage selected by `method`
///
/// The result does not include the method byte. Decoders cap every stage at
/// the sector size, so a chain whose inner stage grows the data is refused.
pub fn compress(data: &[u8], method: u8) -> Result<Vec<u8>> {
    compress_stages(data, method)?.ok_or_else(|| {
        CodecError::Compress {
            method: "multi",
            message: format!("an inner stage of method 0x{method:02X} expands the data"),
        }
        .into()
    })
}

fn compress_stages(data: &[u8], method: u8) -> Result<Option<Vec<u8>>> {
    let stages = decompression_stages(method)?;

    let mut buffer = data.to_vec();
    // stages run innermost first; every output except the outermost is
    // something a decoder has to hold within the sector size
    for (applied, stage) in stages.into_iter().rev().enumerate() {
        if applied > 0 && buffer.len() > data.len() {
            return Ok(None);
        }
        buffer = match stage {
            CompressionMethod::Zlib => algorithms::zlib::compress(&buffer)?,
            CompressionMethod::BZip2 => algorithms::bzip2::compress(&buffer)?,
            CompressionMethod::Lzma => algorithms::lzma::compress(&buffer)?,
            CompressionMethod::PKWare => algorithms::pkware::compress(&buffer)?,
            CompressionMethod::Sparse => algorithms::sparse::compress(&buffer),
            CompressionMethod::Huffman
            | CompressionMethod::AdpcmMono
            | CompressionMethod::AdpcmStereo => {
                return Err(CodecError::Unsupported {
                    method: stage.name(),
                }
                .into())
            }
        };
    }
    Ok(Some(buffer))
}

/// Build a stored sector: method byte plus payload, or the raw bytes when
/// compression does not make the sector smaller
pub fn compress_sector(data: &[u8], method: u8) -> Result<Vec<u8>> {
    let Some(compressed) = compress_stages(data, method)? else {
        return Ok(data.to_vec());
    };
    if compressed.len() + 1 >= data.len() {
        return Ok(data.to_vec());
    }

    let mut sector = Vec::with_capacity(compressed.len() + 1);
    sector.push(method);
    sector.extend_from_slice(&compressed);
    Ok(sector)
}
