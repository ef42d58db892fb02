//! PKWARE DCL implode/explode using pklib

use super::{compress_error, decompress_error, read_bounded};
use crate::error::CodecError;
use pklib::{implode_bytes, CompressionMode, DictionarySize, ExplodeReader};

/// Decompress PKWARE imploded data, producing at most `expected_size` bytes
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Err(decompress_error("PKWARE", "empty input"));
    }

    let reader = ExplodeReader::new(data).map_err(|e| decompress_error("PKWARE", e))?;
    read_bounded("PKWARE", reader, expected_size).inspect_err(|e| {
        log::debug!("PKWARE explode failed on {} bytes: {e}", data.len());
    })
}

/// Compress with PKWARE implode (binary mode, 4 KiB dictionary)
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    implode_bytes(data, CompressionMode::Binary, DictionarySize::Size4K)
        .map_err(|e| compress_error("PKWARE", e))
}
