//! Cache key derivation.
//!
//! Keys are short, storage-friendly strings derived from the diagram source.
//! The hash is a 32-bit shift-and-subtract accumulator over UTF-16 code units,
//! so keys written by the browser build of the blog and keys computed here
//! agree byte for byte.

/// Default namespace prefix for diagram cache keys in shared session storage.
pub const DEFAULT_CACHE_PREFIX: &str = "mermaid-cache-";

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hash diagram source text into a base-36 string.
///
/// Not collision resistant. Two diagrams sharing a hash share a storage slot,
/// and the last write wins.
pub fn hash_diagram(diagram: &str) -> String {
    let mut hash: i32 = 0;
    for unit in diagram.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    to_base36(hash.unsigned_abs())
}

/// Build the namespaced storage key for a diagram.
pub fn cache_key(prefix: &str, diagram: &str) -> String {
    format!("{prefix}{}", hash_diagram(diagram))
}

fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(7);
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    // Every byte comes from BASE36_DIGITS, which is ASCII.
    digits.into_iter().map(char::from).collect()
}
