//! Run-length packing of `BSD0` payloads
//!
//! The packed stream starts with a 4-byte size that is ignored. A byte with
//! the high bit set is followed by `(b & 0x7F) + 1` literal bytes; any other
//! byte skips `b + 1` zero bytes. Unwritten output stays zero.

/// Unpack into a buffer of exactly `size` bytes
pub(crate) fn decompress(data: &[u8], size: usize) -> Vec<u8> {
    let mut output = vec![0u8; size];
    let mut out = 0usize;
    let mut pos = 4usize.min(data.len());

    while pos < data.len() && out < size {
        let control = data[pos];
        pos += 1;

        if control & 0x80 != 0 {
            let count = ((control & 0x7F) as usize + 1)
                .min(size - out)
                .min(data.len() - pos);
            output[out..out + count].copy_from_slice(&data[pos..pos + count]);
            out += count;
            pos += count;
        } else {
            out += control as usize + 1;
        }
    }

    output
}

/// Pack a buffer; used to build fragments
#[cfg(test)]
pub(crate) fn compress(data: &[u8]) -> Vec<u8> {
    let mut output = (data.len() as u32).to_le_bytes().to_vec();
    let mut pos = 0;

    while pos < data.len() {
        let zeros = data[pos..]
            .iter()
            .take(0x80)
            .take_while(|&&b| b == 0)
            .count();
        if zeros > 0 {
            output.push((zeros - 1) as u8);
            pos += zeros;
            continue;
        }

        let literals = data[pos..]
            .iter()
            .take(0x80)
            .take_while(|&&b| b != 0)
            .count();
        output.push(0x80 | (literals - 1) as u8);
        output.extend_from_slice(&data[pos..pos + literals]);
        pos += literals;
    }

    output
}
