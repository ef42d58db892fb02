//! Zlib compression and decompression

use super::{compress_error, decompress_error, oversized_error};
use crate::error::CodecError;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Decompress using zlib/deflate, producing at most `expected_size` bytes
///
/// The stream must reach its end marker; a payload that runs out early is
/// reported instead of yielding a short buffer.
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoder = Decompress::new(true);
    // one spare byte tells an exact fit from an overflow
    let mut output = vec![0u8; expected_size.saturating_add(1)];

    loop {
        let consumed = decoder.total_in() as usize;
        let produced = decoder.total_out() as usize;
        let status = decoder
            .decompress(&data[consumed..], &mut output[produced..], FlushDecompress::Finish)
            .map_err(|e| {
                log::debug!(
                    "Zlib decompression failed: {e}; first bytes {:02X?}",
                    &data[..16.min(data.len())]
                );
                decompress_error("zlib", e)
            })?;

        let total = decoder.total_out() as usize;
        if total > expected_size {
            return Err(oversized_error("zlib", expected_size));
        }
        match status {
            Status::StreamEnd => {
                output.truncate(total);
                return Ok(output);
            }
            _ if total == produced && decoder.total_in() as usize == consumed => {
                return Err(decompress_error("zlib", "stream ended before its end marker"));
            }
            _ => {}
        }
    }
}

/// Compress using zlib/deflate
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| compress_error("zlib", e))?;
    encoder.finish().map_err(|e| compress_error("zlib", e))
}
