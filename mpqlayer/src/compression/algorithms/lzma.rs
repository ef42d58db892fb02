//! LZMA compression and decompression
//!
//! Sectors hold a one-byte filter id (always zero) followed by a classic
//! `.lzma` stream: five property bytes, the 64-bit unpacked size, then data.

use super::{compress_error, decompress_error, oversized_error};
use crate::error::CodecError;
use std::io::{self, Write};

const FILTER_NONE: u8 = 0;

/// Output sink that refuses to grow past a fixed size
struct BoundedSink {
    data: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl Write for BoundedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.data.len() + buf.len() > self.limit {
            self.overflowed = true;
            return Err(io::Error::other("output limit reached"));
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Decompress using LZMA, producing at most `expected_size` bytes
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    let (&filter, mut stream) = data
        .split_first()
        .ok_or_else(|| decompress_error("LZMA", "empty input"))?;
    if filter != FILTER_NONE {
        return Err(decompress_error(
            "LZMA",
            format!("unsupported filter 0x{filter:02X}"),
        ));
    }

    let mut sink = BoundedSink {
        data: Vec::with_capacity(expected_size),
        limit: expected_size,
        overflowed: false,
    };
    if let Err(e) = lzma_rs::lzma_decompress(&mut stream, &mut sink) {
        if sink.overflowed {
            return Err(oversized_error("LZMA", expected_size));
        }
        log::debug!("LZMA decompression failed: {e:?}");
        return Err(decompress_error("LZMA", format!("{e:?}")));
    }
    Ok(sink.data)
}

/// Compress using LZMA
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = vec![FILTER_NONE];
    let mut input = data;
    lzma_rs::lzma_compress(&mut input, &mut output).map_err(|e| compress_error("LZMA", e))?;
    Ok(output)
}
