//! Encryption and decryption algorithms for MPQ files

use crate::error::CodecError;
use crate::hash::{hash_string, hash_type};

/// Seed shared by the cipher and the hash functions
const CIPHER_SEED: u32 = 0xEEEEEEEE;

/// The static encryption table used by all MPQ operations
///
/// 1280 (0x500) 32-bit values, generated at compile time from the fixed
/// pseudo-random sequence seeded with `0x00100001`.
pub static ENCRYPTION_TABLE: [u32; 0x500] = generate_encryption_table();

const fn generate_encryption_table() -> [u32; 0x500] {
    let mut table = [0u32; 0x500];
    let mut seed: u32 = 0x00100001;

    let mut index1 = 0;
    while index1 < 0x100 {
        let mut index2 = 0;
        while index2 < 5 {
            seed = (seed * 125 + 3) % 0x2AAAAB;
            let temp1 = (seed & 0xFFFF) << 0x10;

            seed = (seed * 125 + 3) % 0x2AAAAB;
            let temp2 = seed & 0xFFFF;

            table[index1 + index2 * 0x100] = temp1 | temp2;
            index2 += 1;
        }
        index1 += 1;
    }

    table
}

#[inline]
fn next_key(key: u32) -> u32 {
    (!key << 0x15).wrapping_add(0x11111111) | (key >> 0x0B)
}

/// Decrypt a block of data
pub fn decrypt_block(data: &mut [u32], mut key: u32) {
    if key == 0 {
        return;
    }

    let mut seed = CIPHER_SEED;

    for value in data.iter_mut() {
        seed = seed.wrapping_add(ENCRYPTION_TABLE[0x400 + (key & 0xFF) as usize]);

        let ch = *value ^ key.wrapping_add(seed);
        *value = ch;

        key = next_key(key);
        seed = ch
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Encrypt a block of data
pub fn encrypt_block(data: &mut [u32], mut key: u32) {
    if key == 0 {
        return;
    }

    let mut seed = CIPHER_SEED;

    for value in data.iter_mut() {
        seed = seed.wrapping_add(ENCRYPTION_TABLE[0x400 + (key & 0xFF) as usize]);

        // The running seed follows the plaintext in both directions
        let ch = *value;
        *value = ch ^ key.wrapping_add(seed);

        key = next_key(key);
        seed = ch
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Decrypt a byte buffer in place
///
/// Only whole 32-bit words are transformed; a trailing partial word is left
/// as stored, matching how archives encrypt odd-sized sectors.
pub fn decrypt_bytes(data: &mut [u8], key: u32) {
    transform_bytes(data, key, decrypt_block);
}

/// Encrypt a byte buffer in place
pub fn encrypt_bytes(data: &mut [u8], key: u32) {
    transform_bytes(data, key, encrypt_block);
}

fn transform_bytes(data: &mut [u8], key: u32, op: fn(&mut [u32], u32)) {
    let word_len = data.len() / 4 * 4;
    let mut words: Vec<u32> = data[..word_len]
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    op(&mut words, key);

    for (chunk, word) in data[..word_len].chunks_exact_mut(4).zip(&words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Derive the encryption key of a stored file
///
/// The key is the `FILE_KEY` hash of the plain file name (the part after the
/// last path separator). With `fix_key` it is further mixed with the file's
/// position relative to the archive start and its uncompressed size.
pub fn file_key(
    name: &str,
    file_pos: u64,
    file_size: u32,
    fix_key: bool,
) -> Result<u32, CodecError> {
    let plain = plain_name(name);
    if plain.is_empty() {
        return Err(CodecError::MissingKey(name.to_string()));
    }

    let mut key = hash_string(plain, hash_type::FILE_KEY);
    if fix_key {
        key = key.wrapping_add(file_pos as u32) ^ file_size;
    }
    Ok(key)
}

/// The final path component of an archive name
pub fn plain_name(name: &str) -> &str {
    name.rsplit(['\\', '/']).next().unwrap_or(name)
}
