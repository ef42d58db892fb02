//! Individual codec implementations

pub(super) mod adpcm;
pub(super) mod bzip2;
pub(super) mod lzma;
pub(super) mod pkware;
pub(super) mod sparse;
pub(super) mod zlib;

use crate::error::CodecError;
use std::io::Read;

pub(super) fn decompress_error(method: &'static str, err: impl std::fmt::Display) -> CodecError {
    CodecError::Decompress {
        method,
        message: err.to_string(),
    }
}

pub(super) fn compress_error(method: &'static str, err: impl std::fmt::Display) -> CodecError {
    CodecError::Compress {
        method,
        message: err.to_string(),
    }
}

pub(super) fn oversized_error(method: &'static str, limit: usize) -> CodecError {
    CodecError::Decompress {
        method,
        message: format!("output exceeds the expected {limit} bytes"),
    }
}

/// Drain a decoding reader, failing as soon as it yields more than `limit` bytes
pub(super) fn read_bounded(
    method: &'static str,
    reader: impl Read,
    limit: usize,
) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::with_capacity(limit);
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| decompress_error(method, e))?;
    if output.len() > limit {
        return Err(oversized_error(method, limit));
    }
    Ok(output)
}
