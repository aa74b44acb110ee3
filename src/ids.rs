//! Random identifiers for document entities.
//!
//! Ids are 21 characters drawn from a 64-symbol URL-safe alphabet (126 bits of
//! entropy), so collisions are not a practical concern for editor-sized documents.

use uuid::Uuid;

/// Number of characters in a generated id.
pub const ID_LENGTH: usize = 21;

const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

// Byte 6 of a v4 uuid carries the version nibble in its low six bits.
const VERSION_BYTE: usize = 6;

/// Generates a new random id.
pub fn generate_id() -> String {
    let first = Uuid::new_v4().into_bytes();
    let second = Uuid::new_v4().into_bytes();
    first
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != VERSION_BYTE)
        .map(|(_, b)| b)
        .chain(second.iter())
        .take(ID_LENGTH)
        .map(|b| ALPHABET[(b & 63) as usize] as char)
        .collect()
}
