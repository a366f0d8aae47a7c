//! Character substitution cipher
//!
//! Each character of the input is replaced by its image under a keyed
//! mapping. Encoding is strict: a character with no entry is an error.
//! Decoding is lenient: a character with no preimage is dropped from the
//! output. Callers rely on this asymmetry, so do not "fix" it.

use std::collections::BTreeMap;

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};

/// Arbitrary character mapping. Iteration order is ascending by key.
pub type CharMap = BTreeMap<char, char>;

/// Replace every character of `text` with its image under `mapping`.
pub fn encode(mapping: &CharMap, text: &str) -> Result<String> {
    text.chars()
        .map(|c| {
            mapping.get(&c).copied().ok_or_else(|| {
                XcreeptorError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::UnmappedCharacter,
                    format!("cannot encrypt character {:?}: not in the supported alphabet", c),
                )
            })
        })
        .collect()
}

/// Invert `encode`, dropping characters that have no preimage.
pub fn decode(mapping: &CharMap, text: &str) -> String {
    decode_chars(mapping, text.chars())
}

/// Byte-oriented `decode` for raw cipher output. Each byte is taken as the
/// character with the same code point, so bytes above 0x7f never match an
/// ASCII mapping and are dropped.
pub fn decode_bytes(mapping: &CharMap, bytes: &[u8]) -> String {
    decode_chars(mapping, bytes.iter().map(|&b| char::from(b)))
}

fn decode_chars(mapping: &CharMap, chars: impl Iterator<Item = char>) -> String {
    let inverse = invert(mapping);
    chars.filter_map(|c| inverse.get(&c).copied()).collect()
}

/// Build the value -> key lookup. For mappings that are not injective the
/// smallest key wins.
fn invert(mapping: &CharMap) -> BTreeMap<char, char> {
    let mut inverse = BTreeMap::new();
    for (&from, &to) in mapping {
        inverse.entry(to).or_insert(from);
    }
    inverse
}
