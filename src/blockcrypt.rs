//! AES-256-CBC block encryption
//!
//! Thin wrapper around the RustCrypto `aes` and `cbc` crates with PKCS#7
//! padding. The key must be exactly 32 bytes and the IV exactly 16 bytes;
//! anything else is rejected as misconfiguration rather than silently
//! padded or truncated.
//!
//! There is no authentication tag. A wrong key or IV is detected only when
//! the final block fails to unpad, which is not guaranteed.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of the AES-256 key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the CBC initialization vector in bytes
pub const IV_LEN: usize = 16;

/// AES block size in bytes
const BLOCK_LEN: usize = 16;

/// Encrypt `plaintext` with AES-256-CBC and PKCS#7 padding.
///
/// Output length is always a positive multiple of the block size, so an
/// empty plaintext encrypts to one full block of padding.
pub fn block_encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_lengths(key, iv)?;
    let encryptor = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| {
        misconfiguration("failed to initialize AES-256-CBC encryptor".to_string())
    })?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC `ciphertext` and strip its PKCS#7 padding.
pub fn block_decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_lengths(key, iv)?;

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(XcreeptorError::with_kind(
            ErrorCategory::User,
            ErrorKind::CipherIntegrity,
            format!(
                "ciphertext length {} is not a positive multiple of the {}-byte block size",
                ciphertext.len(),
                BLOCK_LEN
            ),
        ));
    }

    let decryptor = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| {
        misconfiguration("failed to initialize AES-256-CBC decryptor".to_string())
    })?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::CipherIntegrity,
                "corrupt input, wrong key, or wrong IV",
            )
        })
}

fn check_lengths(key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(misconfiguration(format!(
            "AES key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        )));
    }
    if iv.len() != IV_LEN {
        return Err(misconfiguration(format!(
            "IV must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }
    Ok(())
}

fn misconfiguration(msg: String) -> XcreeptorError {
    XcreeptorError::with_kind(ErrorCategory::User, ErrorKind::Misconfiguration, msg)
}
