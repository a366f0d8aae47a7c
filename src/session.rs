//! Authenticated encryption session
//!
//! A [`Session`] exists only after the account check passes. It owns the
//! loaded substitution key and the cipher secrets for repeated use.

use tracing::info;

use crate::account::Account;
use crate::config::{CipherSecrets, Config};
use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};
use crate::keymanager::{KeyLoad, KeyManager, SubstitutionKey};
use crate::layered;

pub struct Session {
    username: String,
    key: SubstitutionKey,
    key_manager: KeyManager,
    secrets: CipherSecrets,
    key_regenerated: bool,
}

impl Session {
    /// Verify `username`/`pin`, then load the substitution key through the
    /// self-healing path.
    pub fn open(config: Config, username: &str, pin: &[u8]) -> Result<Self> {
        let account = Account::new(&config.account_file);
        if !account.exists() {
            return Err(XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::NoAccount,
                "no account found; create one first",
            ));
        }
        if !account.verify_account(username, pin) {
            return Err(XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "invalid username or PIN",
            ));
        }

        let key_manager = KeyManager::new(config.key_file, config.key_password);
        let load = key_manager.load()?;
        let key_regenerated = load.is_regenerated();
        let key = load.into_key();
        info!(username, key_regenerated, "session opened");

        Ok(Self {
            username: username.to_string(),
            key,
            key_manager,
            secrets: config.secrets,
            key_regenerated,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether opening this session had to replace an unusable key file.
    pub fn key_regenerated(&self) -> bool {
        self.key_regenerated
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        layered::encrypt_layered(
            self.key.as_map(),
            plaintext,
            self.secrets.key(),
            self.secrets.iv(),
        )
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        layered::decrypt_layered(
            self.key.as_map(),
            ciphertext,
            self.secrets.key(),
            self.secrets.iv(),
        )
    }

    /// Replace the substitution key in memory and on disk.
    pub fn regenerate_key(&mut self) -> Result<()> {
        self.key = self.key_manager.regenerate()?;
        Ok(())
    }

    /// Re-read the key file, regenerating it if it has become unusable.
    pub fn reload_key(&mut self) -> Result<KeyLoad> {
        let load = self.key_manager.load()?;
        self.key = load.key().clone();
        Ok(load)
    }
}
