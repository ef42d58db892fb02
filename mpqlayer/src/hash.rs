//! Hash algorithms for MPQ file name hashing

use crate::crypto::ENCRYPTION_TABLE;

/// Hash types for MPQ operations
pub mod hash_type {
    /// Starting slot in the hash table
    pub const TABLE_OFFSET: u32 = 0;
    /// First collision discriminator
    pub const NAME_A: u32 = 1;
    /// Second collision discriminator
    pub const NAME_B: u32 = 2;
    /// Encryption key derivation
    pub const FILE_KEY: u32 = 3;
}

/// Upper-case conversion table that also maps `/` to `\`
pub const ASCII_TO_UPPER_SLASH: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    let mut i = b'a';
    while i <= b'z' {
        table[i as usize] = i - 32;
        i += 1;
    }
    table[b'/' as usize] = b'\\';
    table
};

/// Hash a string using the MPQ hash algorithm
///
/// The name is upper-cased and `/` is treated as `\` before hashing, so both
/// spellings of a path land on the same table slot.
pub fn hash_string(name: &str, hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED7FED;
    let mut seed2: u32 = 0xEEEEEEEE;
    let base = (hash_type as usize) << 8;

    for &byte in name.as_bytes() {
        let ch = ASCII_TO_UPPER_SLASH[byte as usize];

        seed1 = ENCRYPTION_TABLE[base + ch as usize] ^ seed1.wrapping_add(seed2);
        seed2 = (ch as u32)
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// The three lookup hashes of a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameHashes {
    /// `TABLE_OFFSET` hash, the first slot searched, before masking
    pub offset: u32,
    /// `NAME_A` hash
    pub name_a: u32,
    /// `NAME_B` hash
    pub name_b: u32,
}

impl NameHashes {
    /// Compute all lookup hashes for a name
    pub fn new(name: &str) -> Self {
        Self {
            offset: hash_string(name, hash_type::TABLE_OFFSET),
            name_a: hash_string(name, hash_type::NAME_A),
            name_b: hash_string(name, hash_type::NAME_B),
        }
    }
}

/// Normalize a path to the archive's canonical separator
pub fn normalize_path(name: &str) -> String {
    name.replace('/', "\\")
}
