//! Two-stage text cipher
//!
//! Encryption: substitution encode, AES-256-CBC encrypt, base64 encode.
//! Decryption runs the exact inverse: base64 decode, AES-256-CBC decrypt,
//! substitution decode. Errors from each stage pass through untouched so
//! callers can tell bad input from a bad key by `ErrorKind` alone.

use crate::armor;
use crate::blockcrypt;
use crate::error::{ErrorKind, Result, XcreeptorError};
use crate::substitution::{self, CharMap};

/// Encrypt `plaintext` into a base64 token.
pub fn encrypt_layered(mapping: &CharMap, plaintext: &str, key: &[u8], iv: &[u8]) -> Result<String> {
    let substituted = substitution::encode(mapping, plaintext)?;
    let ciphertext = blockcrypt::block_encrypt(substituted.as_bytes(), key, iv)?;
    Ok(armor::text_encode(&ciphertext))
}

/// Decrypt a base64 token produced by [`encrypt_layered`].
pub fn decrypt_layered(mapping: &CharMap, ciphertext: &str, key: &[u8], iv: &[u8]) -> Result<String> {
    let decoded = armor::text_decode(ciphertext)?;
    let substituted = blockcrypt::block_decrypt(&decoded, key, iv)?;
    Ok(substitution::decode_bytes(mapping, &substituted))
}

/// Whether `err` is one of the failures that must be reported to the user
/// only as a generic "decryption failed", without saying which stage broke.
pub fn is_decryption_failure(err: &XcreeptorError) -> bool {
    matches!(
        err.kind,
        Some(ErrorKind::CipherIntegrity) | Some(ErrorKind::Encoding)
    )
}
