//! Common utilities for MPQ tables

use crate::crypto::decrypt_bytes;
use crate::error::FormatError;
use crate::hash::{hash_string, hash_type};
use crate::io::TaggedReader;
use crate::Result;

/// Size of one hash or block table entry
pub(crate) const TABLE_ENTRY_SIZE: usize = 16;

/// Encryption key of a table, derived from its well-known name
pub(crate) fn table_key(name: &str) -> u32 {
    hash_string(name, hash_type::FILE_KEY)
}

/// Read and decrypt a classic table
///
/// `pos` is absolute within the source. The whole table must lie inside the
/// source.
pub(crate) fn read_encrypted_table(
    reader: &TaggedReader<'_>,
    table: &'static str,
    pos: u64,
    entries: u32,
    key: u32,
) -> Result<Vec<u8>> {
    let len = entries as u64 * TABLE_ENTRY_SIZE as u64;
    match pos.checked_add(len) {
        Some(end) if end <= reader.len() => {}
        _ => return Err(FormatError::TableOutOfBounds { table }.into()),
    }

    let mut data = reader.read_vec(pos, len as usize)?;
    decrypt_bytes(&mut data, key);
    Ok(data)
}
