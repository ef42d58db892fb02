//! BZip2 compression and decompression

use super::{compress_error, read_bounded};
use crate::error::CodecError;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::Write;

/// Decompress using bzip2, producing at most `expected_size` bytes
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    read_bounded("bzip2", BzDecoder::new(data), expected_size)
}

/// Compress using bzip2
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| compress_error("bzip2", e))?;
    encoder.finish().map_err(|e| compress_error("bzip2", e))
}
