//! Runtime configuration threaded into the core
//!
//! Nothing in the library reads the environment or assumes a working
//! directory; front ends build a [`Config`] and pass it down.

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::blockcrypt::{IV_LEN, KEY_LEN};
use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};

pub const DEFAULT_KEY_FILE: &str = "assets/key.dat";
pub const DEFAULT_ACCOUNT_FILE: &str = "assets/account.dat";

/// Environment variable holding the key-file password.
pub const ENV_KEY_PASSWORD: &str = "XCREEPTOR_PASS_KEY";
/// Environment variable holding the 32-byte AES key.
pub const ENV_AES_KEY: &str = "XCREEPTOR_AES_KEY";
/// Environment variable holding the 16-byte IV.
pub const ENV_IV: &str = "XCREEPTOR_VI_KEY";

/// AES key and IV for the text cipher.
pub struct CipherSecrets {
    key: Zeroizing<Vec<u8>>,
    iv: Zeroizing<Vec<u8>>,
}

impl CipherSecrets {
    /// Fails with [`ErrorKind::Misconfiguration`] unless `key` is 32 bytes
    /// and `iv` is 16 bytes.
    pub fn new(key: Vec<u8>, iv: Vec<u8>) -> Result<Self> {
        let key = Zeroizing::new(key);
        let iv = Zeroizing::new(iv);
        if key.len() != KEY_LEN {
            return Err(XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::Misconfiguration,
                format!(
                    "AES key must be exactly {} bytes, got {} (set {})",
                    KEY_LEN,
                    key.len(),
                    ENV_AES_KEY
                ),
            ));
        }
        if iv.len() != IV_LEN {
            return Err(XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::Misconfiguration,
                format!(
                    "IV must be exactly {} bytes, got {} (set {})",
                    IV_LEN,
                    iv.len(),
                    ENV_IV
                ),
            ));
        }
        Ok(Self { key, iv })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

impl fmt::Debug for CipherSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherSecrets(..)")
    }
}

/// Paths and secrets for one installation.
pub struct Config {
    pub key_file: PathBuf,
    pub account_file: PathBuf,
    pub key_password: Zeroizing<Vec<u8>>,
    pub secrets: CipherSecrets,
}

impl Config {
    /// Config using the default `assets/` paths.
    pub fn new(key_password: Vec<u8>, secrets: CipherSecrets) -> Self {
        Self {
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            account_file: PathBuf::from(DEFAULT_ACCOUNT_FILE),
            key_password: Zeroizing::new(key_password),
            secrets,
        }
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = path.into();
        self
    }

    pub fn with_account_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.account_file = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_lengths_enforced() {
        assert!(CipherSecrets::new(vec![0u8; KEY_LEN], vec![0u8; IV_LEN]).is_ok());

        let err = CipherSecrets::new(vec![0u8; 31], vec![0u8; IV_LEN]).expect_err("short key");
        assert_eq!(err.kind, Some(ErrorKind::Misconfiguration));
        assert!(err.to_string().contains(ENV_AES_KEY));

        let err = CipherSecrets::new(vec![0u8; KEY_LEN], Vec::new()).expect_err("empty iv");
        assert_eq!(err.kind, Some(ErrorKind::Misconfiguration));
        assert!(err.to_string().contains(ENV_IV));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let secrets = CipherSecrets::new(vec![1u8; KEY_LEN], vec![2u8; IV_LEN]).unwrap();
        let config = Config::new(b"pw".to_vec(), secrets);
        assert_eq!(config.key_file, PathBuf::from("assets/key.dat"));
        assert_eq!(config.account_file, PathBuf::from("assets/account.dat"));

        let config = config
            .with_key_file("/tmp/k.dat")
            .with_account_file("/tmp/a.dat");
        assert_eq!(config.key_file, PathBuf::from("/tmp/k.dat"));
        assert_eq!(config.account_file, PathBuf::from("/tmp/a.dat"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let secrets = CipherSecrets::new(vec![b'k'; KEY_LEN], vec![b'v'; IV_LEN]).unwrap();
        assert_eq!(format!("{:?}", secrets), "CipherSecrets(..)");
    }
}
