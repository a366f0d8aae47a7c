//! Text transport encoding for cipher output
//!
//! Standard base64 (`+`, `/`, `=` padding) with no line breaks, so
//! encrypted text can be copied and pasted as a single token.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{ErrorCategory, ErrorKind, Result, XcreeptorError};

/// Encode bytes as padded standard base64.
pub fn text_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64.
///
/// Leading and trailing ASCII whitespace is ignored since pasted text
/// commonly carries a trailing newline.
pub fn text_decode(text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text.trim_ascii()).map_err(|e| {
        XcreeptorError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Encoding,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })
}
