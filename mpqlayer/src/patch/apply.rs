//! Replaying a fragment over base content

use super::header::{PatchFile, PatchKind};
use crate::error::{HashStage, PatchError};
use crate::{signatures, Result};
use byteorder::{ByteOrder, LittleEndian};
use md5::{Digest, Md5};

const BSDIFF_HEADER_SIZE: usize = 32;
const CONTROL_SIZE: usize = 12;

/// One step of a bsdiff control stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    /// Add `len` diff bytes to the base bytes under the cursor
    Add {
        /// Bytes produced
        len: usize,
    },
    /// Copy `len` bytes from the extra block
    Insert {
        /// Bytes produced
        len: usize,
    },
    /// Move the base cursor
    Seek {
        /// Signed distance
        delta: i64,
    },
}

/// A parsed `BSDIFF40` stream
#[derive(Debug, Clone)]
pub struct Bsdiff<'a> {
    /// Control operations in stream order
    pub ops: Vec<PatchOp>,
    /// Declared output size
    pub new_size: u64,
    diff: &'a [u8],
    extra: &'a [u8],
}

impl<'a> Bsdiff<'a> {
    /// Split a stream into its control, diff and extra blocks
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < BSDIFF_HEADER_SIZE {
            return Err(PatchError::Overrun("BSDIFF40 header").into());
        }
        if LittleEndian::read_u64(&data[0..8]) != signatures::BSDIFF40 {
            return Err(PatchError::BadSignature { what: "BSDIFF40" }.into());
        }

        let ctrl_size = usize::try_from(LittleEndian::read_u64(&data[8..16]))
            .map_err(|_| PatchError::Overrun("control"))?;
        let diff_size = usize::try_from(LittleEndian::read_u64(&data[16..24]))
            .map_err(|_| PatchError::Overrun("diff"))?;
        let new_size = LittleEndian::read_u64(&data[24..32]);

        let ctrl_end = BSDIFF_HEADER_SIZE
            .checked_add(ctrl_size)
            .filter(|&end| end <= data.len())
            .ok_or(PatchError::Overrun("control"))?;
        let diff_end = ctrl_end
            .checked_add(diff_size)
            .filter(|&end| end <= data.len())
            .ok_or(PatchError::Overrun("diff"))?;

        let mut ops = Vec::with_capacity(ctrl_size / CONTROL_SIZE * 3);
        for control in data[BSDIFF_HEADER_SIZE..ctrl_end].chunks_exact(CONTROL_SIZE) {
            let add = LittleEndian::read_u32(&control[0..4]) as usize;
            let insert = LittleEndian::read_u32(&control[4..8]) as usize;
            let seek = LittleEndian::read_u32(&control[8..12]);

            if add > 0 {
                ops.push(PatchOp::Add { len: add });
            }
            if insert > 0 {
                ops.push(PatchOp::Insert { len: insert });
            }
            if seek != 0 {
                ops.push(PatchOp::Seek {
                    delta: seek_delta(seek),
                });
            }
        }

        Ok(Self {
            ops,
            new_size,
            diff: &data[ctrl_end..diff_end],
            extra: &data[diff_end..],
        })
    }

    /// Replay the operations over `base`
    ///
    /// `size_after` is the output size the enclosing fragment declares. A
    /// stream announcing any other size is rejected before anything is
    /// allocated.
    pub fn replay(&self, base: &[u8], size_after: u32) -> std::result::Result<Vec<u8>, PatchError> {
        if self.new_size != u64::from(size_after) {
            return Err(PatchError::SizeMismatch {
                expected: size_after,
                actual: self.new_size,
            });
        }
        let new_size = usize::try_from(size_after).map_err(|_| PatchError::Overrun("output"))?;
        let mut output = vec![0u8; new_size];
        let mut new_pos = 0usize;
        let mut old_pos = 0i64;
        let mut diff_pos = 0usize;
        let mut extra_pos = 0usize;

        for op in &self.ops {
            match *op {
                PatchOp::Add { len } => {
                    let out = take(&mut output, &mut new_pos, len, "output")?;
                    let diff = take_ref(self.diff, &mut diff_pos, len, "diff")?;
                    out.copy_from_slice(diff);

                    // base bytes past the end contribute nothing
                    let start = usize::try_from(old_pos).map_err(|_| PatchError::Overrun("base"))?;
                    if let Some(base) = base.get(start..) {
                        for (byte, old) in out.iter_mut().zip(base) {
                            *byte = byte.wrapping_add(*old);
                        }
                    }
                    old_pos += len as i64;
                }
                PatchOp::Insert { len } => {
                    let out = take(&mut output, &mut new_pos, len, "output")?;
                    out.copy_from_slice(take_ref(self.extra, &mut extra_pos, len, "extra")?);
                }
                PatchOp::Seek { delta } => {
                    old_pos += delta;
                    if old_pos < 0 {
                        return Err(PatchError::Overrun("base"));
                    }
                }
            }
        }

        if new_pos != new_size {
            return Err(PatchError::Underrun {
                expected: size_after,
                produced: new_pos,
            });
        }

        Ok(output)
    }
}

/// Seek fields are sign and magnitude, not two's complement
fn seek_delta(raw: u32) -> i64 {
    let magnitude = (raw & 0x7FFF_FFFF) as i64;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn take<'b>(
    buf: &'b mut [u8],
    pos: &mut usize,
    len: usize,
    block: &'static str,
) -> std::result::Result<&'b mut [u8], PatchError> {
    let start = *pos;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or(PatchError::Overrun(block))?;
    *pos = end;
    Ok(&mut buf[start..end])
}

fn take_ref<'b>(
    buf: &'b [u8],
    pos: &mut usize,
    len: usize,
    block: &'static str,
) -> std::result::Result<&'b [u8], PatchError> {
    let start = *pos;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or(PatchError::Overrun(block))?;
    *pos = end;
    Ok(&buf[start..end])
}

fn check_md5(data: &[u8], expected: &[u8; 16], stage: HashStage) -> std::result::Result<(), PatchError> {
    if expected.iter().all(|&b| b == 0) {
        return Ok(());
    }
    let actual = Md5::digest(data);
    if actual.as_slice() != expected {
        return Err(PatchError::HashMismatch {
            stage,
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}

impl PatchFile {
    /// Apply the fragment to `base`
    ///
    /// The base must have exactly the declared pre-patch size. With
    /// `verify_hashes` the MD5 digests of the base and the result are checked
    /// against the fragment's; all-zero digests are not checked. No partial
    /// output is returned on failure.
    pub fn apply(&self, base: &[u8], verify_hashes: bool) -> Result<Vec<u8>> {
        let header = &self.header;
        if base.len() != header.size_before as usize {
            return Err(PatchError::BaseSizeMismatch {
                expected: header.size_before,
                actual: base.len(),
            }
            .into());
        }
        if verify_hashes {
            check_md5(base, &header.md5_before, HashStage::Base)?;
        }

        let output = match header.kind {
            PatchKind::Copy => self.payload.clone(),
            PatchKind::Bsd0 => {
                let stream = Bsdiff::parse(&self.payload)?;
                log::trace!("replaying {} bsdiff operations", stream.ops.len());
                stream.replay(base, header.size_after)?
            }
        };

        if output.len() != header.size_after as usize {
            return Err(PatchError::SizeMismatch {
                expected: header.size_after,
                actual: output.len() as u64,
            }
            .into());
        }
        if verify_hashes {
            check_md5(&output, &header.md5_after, HashStage::Patched)?;
        }

        Ok(output)
    }
}
