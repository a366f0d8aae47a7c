use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// due to a user error - merely that it cannot be confidently determined
    /// by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Plaintext contains a character outside the substitution alphabet.
    UnmappedCharacter,
    /// Block decryption failed to unpad: wrong key, wrong IV, or corrupted
    /// ciphertext.
    CipherIntegrity,
    /// The text transport encoding (base64) is malformed.
    Encoding,
    /// Decrypted key material does not form a valid substitution key.
    InvalidKey,
    /// Cipher key or IV has the wrong length, or other configuration is unusable.
    Misconfiguration,
    /// No account record exists yet.
    NoAccount,
    /// Username or PIN did not match the stored account.
    AuthenticationFailed,
    /// PIN could not be obtained from the configured reader.
    PinUnavailable,
    /// A user-supplied argument is out of range or unparseable.
    InvalidArgument,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct XcreeptorError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl XcreeptorError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for an I/O failure, classified as a user error when the
    /// file simply does not exist.
    pub fn io(msg: impl Into<String>, err: std::io::Error) -> Self {
        let category = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorCategory::User
        } else {
            ErrorCategory::Internal
        };
        Self::with_kind_and_source(category, ErrorKind::Io, msg, err)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the original as source. Category and kind carry over.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Whether this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, XcreeptorError>;
