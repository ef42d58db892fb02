//! Incremental patch (`PTCH`) support
//!
//! A patch file stored in a patch archive carries a short info record
//! followed by the `PTCH` fragment. The fragment names the sizes and MD5
//! digests of the content before and after patching and a transform: either
//! `COPY` (replace the content) or `BSD0` (an RLE-packed bsdiff stream).

mod apply;
mod header;
mod rle;

pub use apply::{Bsdiff, PatchOp};
pub use header::{PatchFile, PatchHeader, PatchInfo, PatchKind, PATCH_HEADER_SIZE};
