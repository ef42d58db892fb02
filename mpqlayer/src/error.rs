//! Error types for the MPQ engine

use std::io;
use thiserror::Error;

/// Result type alias for MPQ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for MPQ operations
#[derive(Error, Debug)]
pub enum Error {
    /// The archive layout is invalid
    #[error("Invalid MPQ format: {0}")]
    Format(#[from] FormatError),

    /// No layer holds the requested file
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// No layer of a chain carries the given archive name
    #[error("Layer not found in chain: {0}")]
    LayerNotFound(String),

    /// Sector decoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Extracted length disagrees with the declared size
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared size
        expected: u64,
        /// Produced size
        actual: u64,
    },

    /// Incremental patch replay failed
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A byte source read failed at a known place
    #[error("Read failed in {layer} at offset 0x{offset:X}: {source}")]
    Source {
        /// Name of the layer that issued the read
        layer: String,
        /// Absolute offset within the byte source
        offset: u64,
        /// Underlying failure
        #[source]
        source: io::Error,
    },
}

/// Structural problems in headers and tables
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No recognised MPQ signature
    #[error("no MPQ signature found")]
    BadSignature,

    /// A structure ends past the end of its container
    #[error("truncated {what}")]
    Truncated {
        /// The structure that was cut short
        what: &'static str,
    },

    /// Table entry count is not a power of two
    #[error("{table} size {size} is not a power of two")]
    TableSizeNotPowerOfTwo {
        /// Table name
        table: &'static str,
        /// Entry count
        size: u32,
    },

    /// Table lies outside the archive
    #[error("{table} lies outside the archive")]
    TableOutOfBounds {
        /// Table name
        table: &'static str,
    },

    /// Header format version we cannot read
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
}

/// Decryption and decompression failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Compression mask contains an unknown bit
    #[error("unknown compression method 0x{0:02X}")]
    UnknownMethod(u8),

    /// Method is known but cannot be decoded
    #[error("{method} is not supported")]
    Unsupported {
        /// Method name
        method: &'static str,
    },

    /// A codec rejected its input
    #[error("{method} decompression failed: {message}")]
    Decompress {
        /// Method name
        method: &'static str,
        /// Codec message
        message: String,
    },

    /// A codec failed to encode
    #[error("{method} compression failed: {message}")]
    Compress {
        /// Method name
        method: &'static str,
        /// Codec message
        message: String,
    },

    /// Sector offset table is inconsistent
    #[error("invalid sector offset table: {0}")]
    BadSectorTable(String),

    /// Sector checksum did not match
    #[error("sector {sector} checksum mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    ChecksumMismatch {
        /// Sector index
        sector: usize,
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// Encryption key cannot be derived from the name
    #[error("cannot derive encryption key for {0:?}")]
    MissingKey(String),
}

/// Which side of a patch a hash check covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashStage {
    /// Content before patching
    Base,
    /// Content after patching
    Patched,
}

impl std::fmt::Display for HashStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashStage::Base => f.write_str("base"),
            HashStage::Patched => f.write_str("patched"),
        }
    }
}

/// Incremental patch failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// Missing or wrong block signature
    #[error("bad {what} signature")]
    BadSignature {
        /// Block name
        what: &'static str,
    },

    /// Base content has the wrong length
    #[error("base is {actual} bytes, patch expects {expected}")]
    BaseSizeMismatch {
        /// Declared size before patching
        expected: u32,
        /// Actual base length
        actual: usize,
    },

    /// Replay read past the end of a block
    #[error("replay overran the {0} block")]
    Overrun(&'static str),

    /// Replay finished before the output was complete
    #[error("replay produced {produced} of {expected} bytes")]
    Underrun {
        /// Declared size after patching
        expected: u32,
        /// Bytes produced
        produced: usize,
    },

    /// Output length disagrees with the declared size
    #[error("patched size {actual} does not match declared {expected}")]
    SizeMismatch {
        /// Declared size after patching
        expected: u32,
        /// Actual or announced output length
        actual: u64,
    },

    /// MD5 check failed
    #[error("{stage} MD5 mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Which side was checked
        stage: HashStage,
        /// Declared digest, hex encoded
        expected: String,
        /// Computed digest, hex encoded
        actual: String,
    },

    /// Unknown XFRM type
    #[error("unsupported patch type 0x{0:08X}")]
    UnsupportedType(u32),
}

impl Error {
    /// Create a size mismatch error
    pub(crate) fn size_mismatch(expected: impl Into<u64>, actual: usize) -> Self {
        Error::SizeMismatch {
            expected: expected.into(),
            actual: actual as u64,
        }
    }

    /// Create a truncation error
    pub(crate) fn truncated(what: &'static str) -> Self {
        Error::Format(FormatError::Truncated { what })
    }

    /// Check if this error means the file or layer is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileNotFound(_) | Error::LayerNotFound(_))
    }

    /// Check if this error indicates corrupted data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Format(_)
                | Error::Codec(_)
                | Error::SizeMismatch { .. }
                | Error::Patch(_)
        )
    }
}
