//! Sparse (zero-run) compression
//!
//! Stream layout: the decompressed length as a big-endian `u32`, then
//! control bytes. A control byte with the high bit set is followed by
//! `(c & 0x7F) + 1` literal bytes; otherwise it stands for `(c & 0x7F) + 3`
//! zero bytes.

use super::decompress_error;
use crate::error::CodecError;

const MAX_LITERAL_RUN: usize = 0x80;
const MIN_ZERO_RUN: usize = 3;
const MAX_ZERO_RUN: usize = 0x7F + MIN_ZERO_RUN;

/// Decompress sparse data
pub(crate) fn decompress(data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    if data.len() < 5 {
        return Err(decompress_error("sparse", "input shorter than 5 bytes"));
    }

    let declared = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if declared > expected_size {
        return Err(decompress_error(
            "sparse",
            format!("stored size {declared} exceeds expected {expected_size}"),
        ));
    }

    let mut output = Vec::with_capacity(declared);
    let mut pos = 4;

    while pos < data.len() && output.len() < declared {
        let control = data[pos];
        pos += 1;
        let remaining = declared - output.len();

        if control & 0x80 != 0 {
            let run = ((control & 0x7F) as usize + 1).min(remaining);
            let literal = data
                .get(pos..pos + run)
                .ok_or_else(|| decompress_error("sparse", "literal run past end of input"))?;
            output.extend_from_slice(literal);
            pos += run;
        } else {
            let run = ((control & 0x7F) as usize + MIN_ZERO_RUN).min(remaining);
            output.resize(output.len() + run, 0);
        }
    }

    Ok(output)
}

/// Compress with sparse encoding
pub(crate) fn compress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() + data.len() / MAX_LITERAL_RUN + 5);
    output.extend_from_slice(&(data.len() as u32).to_be_bytes());

    let mut pos = 0;
    let mut literal_start = 0;

    while pos < data.len() {
        let zeros = data[pos..].iter().take_while(|&&b| b == 0).count();
        if zeros < MIN_ZERO_RUN {
            pos += zeros.max(1);
            continue;
        }

        flush_literals(&mut output, &data[literal_start..pos]);

        let mut remaining = zeros;
        while remaining >= MIN_ZERO_RUN {
            let run = remaining.min(MAX_ZERO_RUN);
            output.push((run - MIN_ZERO_RUN) as u8);
            remaining -= run;
        }
        pos += zeros - remaining;
        literal_start = pos;
    }

    flush_literals(&mut output, &data[literal_start..]);
    output
}

fn flush_literals(output: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_LITERAL_RUN) {
        output.push(0x80 | (chunk.len() - 1) as u8);
        output.extend_from_slice(chunk);
    }
}
