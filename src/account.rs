//! Single-user account record
//!
//! The record is a two-line text file: the lowercase hex SHA-256 digest of
//! the PIN, then the username. The username is trimmed when read back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};
use crate::file_ops;

/// Lowercase hex SHA-256 digest of `pin`.
pub fn hash_pin(pin: &[u8]) -> String {
    hex::encode(Sha256::digest(pin))
}

/// Strip the whitespace set used by the record format: space, tab, CR, LF.
fn trim_record_field(field: &str) -> &str {
    field.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// Account record stored at a fixed path.
#[derive(Debug, Clone)]
pub struct Account {
    path: PathBuf,
}

impl Account {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an account record exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write a new record, replacing any existing one.
    pub fn create_account(&self, username: &str, pin: &[u8]) -> Result<()> {
        let record = format!("{}\n{}", hash_pin(pin), username);
        file_ops::write_file_secure(&self.path, record.as_bytes())
            .map_err(|e| e.with_context("failed to create account"))?;
        debug!(path = %self.path.display(), "account created");
        Ok(())
    }

    /// Check `username` and `pin` against the stored record.
    ///
    /// Any failure to read the record counts as a mismatch.
    pub fn verify_account(&self, username: &str, pin: &[u8]) -> bool {
        let verified = match self.read_record() {
            Ok((stored_hash, stored_user)) => {
                username == stored_user && hash_pin(pin) == stored_hash
            }
            Err(e) => {
                debug!(error = %e, "account record unreadable");
                false
            }
        };
        debug!(verified, "account verification");
        verified
    }

    /// Stored username. Fails with [`ErrorKind::NoAccount`] when no record exists.
    pub fn load_account(&self) -> Result<String> {
        self.read_record().map(|(_, username)| username)
    }

    /// Read (digest, trimmed username). Missing lines read as empty.
    fn read_record(&self) -> Result<(String, String)> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                XcreeptorError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::NoAccount,
                    "no account found",
                    e,
                )
            } else {
                XcreeptorError::io(format!("failed to read from {}", self.path.display()), e)
            }
        })?;

        let mut lines = contents.lines();
        let stored_hash = lines.next().unwrap_or_default().to_string();
        let stored_user = trim_record_field(lines.next().unwrap_or_default()).to_string();
        Ok((stored_hash, stored_user))
    }
}
