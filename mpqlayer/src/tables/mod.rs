//! MPQ table structures (hash, block, hi-block)

mod block;
mod common;
mod hash;

pub use block::{BlockEntry, BlockFlags, BlockTable, HiBlockTable};
pub use hash::{HashEntry, HashTable};

pub(crate) use common::{read_encrypted_table, table_key};
