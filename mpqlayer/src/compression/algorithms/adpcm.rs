//! IMA ADPCM decompression for WAVE sectors
//!
//! Stream layout: a zero byte, the bit shift, one initial 16-bit sample per
//! channel, then one encoded byte per sample with channels interleaved.
//! `0x80` repeats the predicted sample and lowers the step index; `0x81`
//! raises the step index without producing a sample.

use super::decompress_error;
use crate::error::CodecError;

const INITIAL_STEP_INDEX: usize = 0x2C;
const MAX_STEP_INDEX: usize = 0x58;

const NEXT_STEP_TABLE: [i8; 32] = [
    -1, 0, -1, 4, -1, 2, -1, 6, -1, 1, -1, 5, -1, 3, -1, 7, -1, 1, -1, 5, -1, 3, -1, 7, -1, 2, -1,
    4, -1, 6, -1, 8,
];

const STEP_SIZE_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449,
    494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272,
    2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493,
    10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

#[derive(Debug, Clone, Copy)]
struct Channel {
    predicted: i32,
    step_index: usize,
}

impl Channel {
    fn decode(&mut self, encoded: u8, bit_shift: u8) -> i16 {
        let step = STEP_SIZE_TABLE[self.step_index];
        let mut difference = step >> bit_shift;
        for bit in 0..6 {
            if encoded & (1 << bit) != 0 {
                difference += step >> bit;
            }
        }

        self.predicted = if encoded & 0x40 != 0 {
            self.predicted - difference
        } else {
            self.predicted + difference
        }
        .clamp(i16::MIN as i32, i16::MAX as i32);

        let next = self.step_index as i32 + NEXT_STEP_TABLE[(encoded & 0x1F) as usize] as i32;
        self.step_index = next.clamp(0, MAX_STEP_INDEX as i32) as usize;

        self.predicted as i16
    }
}

/// Decompress ADPCM data with one or two channels
pub(crate) fn decompress(
    data: &[u8],
    expected_size: usize,
    channel_count: usize,
) -> Result<Vec<u8>, CodecError> {
    let header_len = 2 + 2 * channel_count;
    if data.len() < header_len {
        return Err(decompress_error("ADPCM", "input shorter than its header"));
    }

    let bit_shift = data[1];
    if bit_shift > 15 {
        return Err(decompress_error(
            "ADPCM",
            format!("invalid bit shift {bit_shift}"),
        ));
    }

    let mut output = Vec::with_capacity(expected_size);
    let mut channels = Vec::with_capacity(channel_count);
    for ch in 0..channel_count {
        let sample = i16::from_le_bytes([data[2 + ch * 2], data[3 + ch * 2]]);
        channels.push(Channel {
            predicted: sample as i32,
            step_index: INITIAL_STEP_INDEX,
        });
        push_sample(&mut output, sample, expected_size);
    }

    let mut current = channel_count - 1;
    for &encoded in &data[header_len..] {
        if output.len() + 2 > expected_size {
            break;
        }
        current = (current + 1) % channel_count;
        let channel = &mut channels[current];

        match encoded {
            0x80 => {
                channel.step_index = channel.step_index.saturating_sub(1);
                push_sample(&mut output, channel.predicted as i16, expected_size);
            }
            0x81 => {
                channel.step_index = (channel.step_index + 8).min(MAX_STEP_INDEX);
                // the next byte belongs to the same channel
                current = (current + channel_count - 1) % channel_count;
            }
            _ => {
                let sample = channel.decode(encoded, bit_shift);
                push_sample(&mut output, sample, expected_size);
            }
        }
    }

    Ok(output)
}

fn push_sample(output: &mut Vec<u8>, sample: i16, limit: usize) {
    if output.len() + 2 <= limit {
        output.extend_from_slice(&sample.to_le_bytes());
    }
}
